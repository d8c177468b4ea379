//! Document rendering.
//!
//! This module provides:
//! - Assembly of the resource graph and pipeline topology into one document
//! - Canonical JSON rendering and structural parsing
//! - Atomic staging of documents and profile configurations

mod document;
mod staging;

pub use document::{Document, ParsedDocument, ParsedResource, TEMPLATE_FORMAT_VERSION};
pub use staging::{stage_document, stage_profile_configurations};
