//! Collaborator interfaces for file retrieval and resume parsing
//!
//! The coordination core treats the remote file store and the parser as
//! opaque collaborators behind these traits. Their internal behavior
//! (transport, retries, extraction quality) is out of scope here; the
//! worker pool only relies on the contract that each call either yields a
//! value or an [`IngestError`].

use crate::error::IngestError;
use serde::{Deserialize, Serialize};

/// A file fetched from the remote store
#[derive(Debug, Clone)]
pub struct RemoteFile {
    /// Filename as known to the store
    pub filename: String,
    /// Content type reported by the store, if any
    pub content_type: Option<String>,
    /// Raw file bytes
    pub data: Vec<u8>,
}

impl RemoteFile {
    /// Resolve the effective content type: the store's report when present,
    /// otherwise a guess from the filename extension.
    pub fn resolved_content_type(&self) -> String {
        match &self.content_type {
            Some(ct) if !ct.is_empty() => ct.clone(),
            _ => mime_guess::from_path(&self.filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }
}

/// Structured data extracted from a resume
///
/// The parser collaborator owns the extraction semantics; this type only
/// fixes the shape the coordination layer stores and reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredResume {
    /// Candidate name, if detected
    pub name: Option<String>,
    /// Contact email, if detected
    pub email: Option<String>,
    /// Contact phone number, if detected
    pub phone: Option<String>,
    /// Plain-text body of the resume
    pub raw_text: String,
    /// Detected skill keywords
    pub skills: Vec<String>,
}

/// Abstraction over the remote file store, enabling testability.
#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    /// Download a file by its store identifier
    async fn download(&self, file_id: &str) -> Result<RemoteFile, IngestError>;
}

/// Abstraction over resume content extraction, enabling testability.
#[async_trait::async_trait]
pub trait ResumeParser: Send + Sync {
    /// Extract structured data from raw file bytes
    async fn extract(&self, data: &[u8]) -> Result<StructuredResume, IngestError>;
}
