//! In-memory stand-ins for the external collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use mail2drive::credentials::{Credential, CredentialError, CredentialResolver};
use mail2drive::engine::{RunEvent, RunObserver};
use mail2drive::mailbox::{MailboxClient, MailboxError, MessageContent};
use mail2drive::render::{DocumentRenderer, PdfRenderer, RenderError, RenderRequest};
use mail2drive::storage::{StorageUploader, UploadError, UploadedFile};
use secrecy::SecretString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    Valid,
    NotConnected,
    RefreshFailed,
}

/// Resolves credentials per user; users listed in `disconnected` fail.
pub struct FakeCredentials {
    pub mode: CredentialMode,
    pub disconnected: Vec<String>,
    pub calls: AtomicUsize,
}

impl FakeCredentials {
    pub fn new(mode: CredentialMode) -> Self {
        Self {
            mode,
            disconnected: vec![],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn disconnect(mut self, user_id: &str) -> Self {
        self.disconnected.push(user_id.to_string());
        self
    }
}

#[async_trait]
impl CredentialResolver for FakeCredentials {
    async fn resolve(&self, user_id: &str) -> Result<Credential, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.disconnected.iter().any(|u| u == user_id) {
            return Err(CredentialError::NotConnected);
        }
        match self.mode {
            CredentialMode::Valid => Ok(Credential::new(SecretString::from(format!("token-{}", user_id)), None)),
            CredentialMode::NotConnected => Err(CredentialError::NotConnected),
            CredentialMode::RefreshFailed => Err(CredentialError::RefreshFailed("invalid_grant".to_string())),
        }
    }
}

/// Mailbox serving a fixed candidate list.
pub struct FakeMailbox {
    pub ids: Vec<String>,
    pub search_status: Option<u16>,
    pub fetch_fail: Vec<String>,
    pub empty_subjects: bool,
    pub queries: Mutex<Vec<(String, u32)>>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeMailbox {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            search_status: None,
            fetch_fail: vec![],
            empty_subjects: false,
            queries: Mutex::new(vec![]),
            fetched: Mutex::new(vec![]),
        }
    }

    pub fn failing_search(mut self, status: u16) -> Self {
        self.search_status = Some(status);
        self
    }

    pub fn failing_fetch(mut self, message_id: &str) -> Self {
        self.fetch_fail.push(message_id.to_string());
        self
    }

    pub fn without_subjects(mut self) -> Self {
        self.empty_subjects = true;
        self
    }

    pub fn queries(&self) -> Vec<(String, u32)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailboxClient for FakeMailbox {
    async fn search(&self, _credential: &Credential, query: &str, max_results: u32) -> Result<Vec<String>, MailboxError> {
        self.queries.lock().unwrap().push((query.to_string(), max_results));
        if let Some(status) = self.search_status {
            return Err(MailboxError::Http {
                status,
                message: "backend error".to_string(),
            });
        }
        Ok(self.ids.iter().take(max_results as usize).cloned().collect())
    }

    async fn fetch(&self, _credential: &Credential, message_id: &str) -> Result<MessageContent, MailboxError> {
        self.fetched.lock().unwrap().push(message_id.to_string());
        if self.fetch_fail.iter().any(|id| id == message_id) {
            return Err(MailboxError::Transport("connection reset".to_string()));
        }
        Ok(MessageContent {
            id: message_id.to_string(),
            subject: if self.empty_subjects {
                String::new()
            } else {
                format!("Invoice {}", message_id)
            },
            from: "billing@example.com".to_string(),
            to: "me@example.com".to_string(),
            date: "Tue, 3 Mar 2026 10:00:00 +0900".to_string(),
            body_text: format!("Body of {}", message_id),
        })
    }
}

/// Uploader that records every call and fails on the configured 1-based
/// call number.
pub struct FakeUploader {
    pub fail_on_call: Option<usize>,
    pub calls: AtomicUsize,
    pub uploads: Mutex<Vec<(String, String)>>,
}

impl FakeUploader {
    pub fn new() -> Self {
        Self {
            fail_on_call: None,
            calls: AtomicUsize::new(0),
            uploads: Mutex::new(vec![]),
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageUploader for FakeUploader {
    async fn upload(
        &self,
        _credential: &Credential,
        folder_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, UploadError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(UploadError::Transport("upload interrupted".to_string()));
        }
        assert!(bytes.starts_with(b"%PDF"), "uploaded bytes are not a PDF");
        self.uploads
            .lock()
            .unwrap()
            .push((folder_id.to_string(), filename.to_string()));
        Ok(UploadedFile {
            file_id: format!("file-{}", call),
            web_view_link: None,
        })
    }
}

/// Real PDF renderer that also keeps every request.
pub struct RecordingRenderer {
    pub requests: Mutex<Vec<RenderRequest>>,
    pub fail: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(vec![]),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl DocumentRenderer for RecordingRenderer {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(RenderError::Pdf("font table missing".to_string()));
        }
        PdfRenderer::new().render(request)
    }
}

/// Observer keeping every event.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<RunEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl RunObserver for RecordingObserver {
    fn on_event(&self, event: &RunEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
