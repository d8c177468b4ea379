//! Stackflow command line interface.
//!
//! # Usage
//!
//! ```bash
//! # Render and stage the pipeline document only
//! stackflow provision --service-name widget --pipeline-name delivery \
//!     --repo https://github.com/acme/widget --oauth-token "$GITHUB_TOKEN" \
//!     --bucket acme-artifacts --noop
//!
//! # Upload and converge against a management endpoint
//! stackflow provision ... --endpoint http://localhost:4566
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use stackflow::config::ProvisionerConfig;
use stackflow::http::{HttpArtifactUploader, HttpStackBackend};
use stackflow::observability::{init_logging, LogFormat};
use stackflow::options::ProvisionOptions;
use stackflow::provision::Provisioner;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(version)]
#[command(about = "Synthesize a delivery pipeline and converge its stack")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format (overrides STACKFLOW_LOG_FORMAT)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render the pipeline document and converge the pipeline stack
    Provision(ProvisionArgs),
}

#[derive(clap::Args)]
struct ProvisionArgs {
    /// Name of the service the pipeline deploys
    #[arg(long)]
    service_name: String,

    /// Pipeline name; the stack is named <service>-<pipeline>
    #[arg(long)]
    pipeline_name: String,

    /// Source repository URL, optionally ending in a branch
    #[arg(long)]
    repo: String,

    /// Source-control token
    #[arg(long, env = "GITHUB_OAUTH_TOKEN", hide_env_values = true)]
    oauth_token: String,

    /// Artifact bucket the document is uploaded to
    #[arg(long)]
    bucket: String,

    /// Render and stage only; never contact the backend
    #[arg(long)]
    noop: bool,

    /// Management endpoint for stacks and artifacts
    #[arg(long, env = "STACKFLOW_ENDPOINT")]
    endpoint: Option<String>,

    /// Staging directory (overrides STACKFLOW_STAGING_DIR)
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Convergence timeout in seconds (overrides STACKFLOW_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Toolchain version for the build image, e.g. 1.79.0 [default: output of
    /// `rustc --version` found on PATH]
    #[arg(long, env = "STACKFLOW_TOOLCHAIN_VERSION")]
    toolchain_version: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ProvisionerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(format) = cli.log_format {
        config.log_format = format.into();
    }
    init_logging(config.log_format);

    let result = match cli.command {
        Commands::Provision(args) => provision(config, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "stackflow failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn provision(mut config: ProvisionerConfig, args: ProvisionArgs) -> anyhow::Result<()> {
    if let Some(dir) = args.staging_dir {
        config = config.with_staging_dir(dir);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let options = ProvisionOptions::new(
        args.service_name,
        args.pipeline_name,
        args.repo,
        args.oauth_token,
        args.bucket,
    )
    .with_dry_run(args.noop);
    options.validate().context("invalid provision options")?;

    let mut provisioner = Provisioner::new(config);
    if let Some(raw) = args.toolchain_version {
        provisioner = provisioner.with_toolchain_version(raw);
    }
    if let Some(endpoint) = args.endpoint.as_deref() {
        let backend = HttpStackBackend::new(endpoint).context("configuring stack backend")?;
        let uploader = HttpArtifactUploader::new(endpoint).context("configuring artifact uploader")?;
        provisioner = provisioner
            .with_backend(Arc::new(backend))
            .with_uploader(Arc::new(uploader));
    }

    let outcome = provisioner
        .provision(&options)
        .await
        .with_context(|| format!("provisioning stack {}", options.pipeline_stack_name()))?;

    match outcome.stack_id() {
        Some(stack_id) => println!("{} converged: {stack_id}", outcome.stack_name),
        None => println!("staged {}", outcome.staged_path.display()),
    }
    for path in &outcome.profile_paths {
        println!("commit with the build output: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_provision_args() {
        let cli = Cli::try_parse_from([
            "stackflow",
            "provision",
            "--service-name",
            "widget",
            "--pipeline-name",
            "delivery",
            "--repo",
            "https://github.com/acme/widget",
            "--oauth-token",
            "ghp_secret",
            "--bucket",
            "acme-artifacts",
            "--noop",
            "--endpoint",
            "http://localhost:4566",
            "--staging-dir",
            "/tmp/stackflow",
            "--timeout-secs",
            "90",
            "--toolchain-version",
            "1.79.0",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert!(matches!(cli.log_format, Some(LogFormatArg::Json)));
        let Commands::Provision(args) = cli.command;
        assert!(args.noop);
        assert_eq!(args.service_name, "widget");
        assert_eq!(args.pipeline_name, "delivery");
        assert_eq!(args.repo, "https://github.com/acme/widget");
        assert_eq!(args.oauth_token, "ghp_secret");
        assert_eq!(args.bucket, "acme-artifacts");
        assert_eq!(args.endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(args.staging_dir, Some(PathBuf::from("/tmp/stackflow")));
        assert_eq!(args.timeout_secs, Some(90));
        assert_eq!(args.toolchain_version.as_deref(), Some("1.79.0"));
    }

    #[test]
    fn test_help_names_the_toolchain_override() {
        let mut command = Cli::command();
        let help = command
            .find_subcommand_mut("provision")
            .unwrap()
            .render_long_help()
            .to_string();
        assert!(help.contains("STACKFLOW_TOOLCHAIN_VERSION"));
        assert!(help.contains("--toolchain-version"));
    }

    #[test]
    fn test_missing_required_arg_is_rejected() {
        let err = Cli::try_parse_from(["stackflow", "provision", "--service-name", "widget"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
