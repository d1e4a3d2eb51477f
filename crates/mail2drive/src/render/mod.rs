//! Message-to-document rendering.

pub mod pdf;

use thiserror::Error;

pub use pdf::PdfRenderer;

/// Input for one rendered document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderRequest {
    pub title: String,
    /// Ordered `key: value` lines printed under the title.
    pub metadata: Vec<(String, String)>,
    pub body_text: String,
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to build PDF: {0}")]
    Pdf(String),
}

/// Turns a message into document bytes. Rendering is CPU-bound and
/// synchronous.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError>;
}
