//! Uploading rendered documents to their destination folder.

pub mod drive;
pub mod filesystem;

use async_trait::async_trait;
use thiserror::Error;

use crate::credentials::Credential;

pub use drive::DriveUploader;
pub use filesystem::FilesystemUploader;

/// Reference to an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_id: String,
    pub web_view_link: Option<String>,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("storage API returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("upload request failed: {0}")]
    Transport(String),

    #[error("unexpected storage response: {0}")]
    Decode(String),

    #[error("failed to write '{path}': {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid destination '{0}'")]
    InvalidDestination(String),
}

impl UploadError {
    /// Upstream HTTP status, when the provider answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Stores document bytes in a folder and returns the created file.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    async fn upload(
        &self,
        credential: &Credential,
        folder_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, UploadError>;
}
