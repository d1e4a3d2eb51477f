//! Mailbox search and message retrieval.

pub mod gmail;

use async_trait::async_trait;
use thiserror::Error;

use crate::credentials::Credential;

pub use gmail::GmailClient;

/// Message metadata and text needed to render a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    /// Plain-text body, or the provider snippet when no body is fetched.
    pub body_text: String,
}

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("mailbox API returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("mailbox request failed: {0}")]
    Transport(String),

    #[error("unexpected mailbox response: {0}")]
    Decode(String),
}

impl MailboxError {
    /// Upstream HTTP status, when the provider answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            MailboxError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Mailbox operations the engine depends on.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// Identifiers of messages matching `query`, at most `max_results`, in
    /// provider order.
    async fn search(&self, credential: &Credential, query: &str, max_results: u32) -> Result<Vec<String>, MailboxError>;

    async fn fetch(&self, credential: &Credential, message_id: &str) -> Result<MessageContent, MailboxError>;
}
