//! HTTP implementations of the remote interfaces.
//!
//! Both clients speak JSON to a management endpoint:
//!
//! | Operation        | Request                                   |
//! |------------------|-------------------------------------------|
//! | describe         | `GET /stacks/{name}` (404 = absent)       |
//! | create           | `POST /stacks/{name}`                     |
//! | update           | `PUT /stacks/{name}`                      |
//! | events           | `GET /stacks/{name}/events?since=RFC3339` |
//! | upload           | `PUT /buckets/{bucket}/objects/{key}`     |

use crate::converge::{StackBackend, StackDescription, StackEvent, StackSubmission, SubmitOutcome};
use crate::errors::{ProvisionError, Result};
use crate::upload::{object_location, ArtifactUploader};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|e| ProvisionError::malformed_input("endpoint", e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ProvisionError::malformed_input(
            "endpoint",
            format!("'{endpoint}' cannot be used as a base URL"),
        ));
    }
    Ok(url)
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProvisionError::malformed_input("endpoint", format!("failed to build HTTP client: {e}")))
}

/// Appends escaped path segments to the endpoint.
fn endpoint_url(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Maps a non-success status to the error taxonomy.
fn classify_status(operation: &str, status: StatusCode, body: &str) -> ProvisionError {
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        body.trim().to_string()
    };
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ProvisionError::remote_transient(operation, message)
    } else {
        ProvisionError::remote_rejected(operation, message)
    }
}

fn transport_error(operation: &str, err: &reqwest::Error) -> ProvisionError {
    ProvisionError::remote_transient(operation, err.to_string())
}

async fn read_json<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| transport_error(operation, &e))?;
    if !status.is_success() {
        return Err(classify_status(operation, status, &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| ProvisionError::remote_rejected(operation, format!("unreadable response: {e}")))
}

/// Stack backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStackBackend {
    client: Client,
    base: Url,
}

impl HttpStackBackend {
    /// Creates a backend for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the endpoint is not an absolute URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base: parse_endpoint(endpoint)?,
        })
    }

    fn stack_url(&self, stack_name: &str) -> Url {
        endpoint_url(&self.base, &["stacks", stack_name])
    }

    async fn submit(&self, operation: &str, submission: &StackSubmission, create: bool) -> Result<SubmitOutcome> {
        let url = self.stack_url(&submission.stack_name);
        let request = if create {
            self.client.post(url)
        } else {
            self.client.put(url)
        };
        let response = request
            .json(submission)
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        read_json(operation, response).await
    }
}

#[async_trait]
impl StackBackend for HttpStackBackend {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        let response = self
            .client
            .get(self.stack_url(stack_name))
            .send()
            .await
            .map_err(|e| transport_error("describe_stack", &e))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(stack_name, "Stack not found");
            return Ok(None);
        }
        read_json("describe_stack", response).await.map(Some)
    }

    async fn create_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome> {
        self.submit("create_stack", submission, true).await
    }

    async fn update_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome> {
        self.submit("update_stack", submission, false).await
    }

    async fn stack_events(&self, stack_name: &str, since: DateTime<Utc>) -> Result<Vec<StackEvent>> {
        let mut url = endpoint_url(&self.base, &["stacks", stack_name, "events"]);
        url.query_pairs_mut()
            .append_pair("since", &since.to_rfc3339_opts(SecondsFormat::Millis, true));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("stack_events", &e))?;
        read_json("stack_events", response).await
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    location: Option<String>,
}

/// Artifact uploader over HTTP.
#[derive(Debug, Clone)]
pub struct HttpArtifactUploader {
    client: Client,
    base: Url,
}

impl HttpArtifactUploader {
    /// Creates an uploader for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the endpoint is not an absolute URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base: parse_endpoint(endpoint)?,
        })
    }
}

#[async_trait]
impl ArtifactUploader for HttpArtifactUploader {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<String> {
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| ProvisionError::io(format!("reading {}", local_path.display()), e))?;
        let url = endpoint_url(&self.base, &["buckets", bucket, "objects", key]);
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error("upload", &e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| transport_error("upload", &e))?;
        if !status.is_success() {
            return Err(classify_status("upload", status, &text));
        }
        let location = serde_json::from_str::<UploadResponse>(&text)
            .ok()
            .and_then(|r| r.location)
            .unwrap_or_else(|| object_location(bucket, key));
        debug!(%location, "Upload confirmed");
        Ok(location)
    }
}
