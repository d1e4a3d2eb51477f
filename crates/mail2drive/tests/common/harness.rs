//! Test harness wiring fakes into a `RuleRunner`.

#![allow(dead_code)]

use std::sync::Arc;

use mail2drive::engine::{ClaimPolicy, EngineConfig, RunObserver};
use mail2drive::ledger::{DedupLedger, RunLedger};
use mail2drive::{Database, RuleRunner};

use super::fakes::{CredentialMode, FakeCredentials, FakeMailbox, FakeUploader, RecordingObserver, RecordingRenderer};

/// Isolated environment: in-memory database plus shared handles to every
/// fake so tests can inspect what the engine did.
pub struct TestHarness {
    pub db: Database,
    pub credentials: Arc<FakeCredentials>,
    pub mailbox: Arc<FakeMailbox>,
    pub renderer: Arc<RecordingRenderer>,
    pub uploader: Arc<FakeUploader>,
    pub observer: Arc<RecordingObserver>,
    pub config: EngineConfig,
}

impl TestHarness {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            db: Database::open_in_memory().expect("Failed to create test database"),
            credentials: Arc::new(FakeCredentials::new(CredentialMode::Valid)),
            mailbox: Arc::new(FakeMailbox::new(ids)),
            renderer: Arc::new(RecordingRenderer::new()),
            uploader: Arc::new(FakeUploader::new()),
            observer: Arc::new(RecordingObserver::default()),
            config: EngineConfig::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: FakeCredentials) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    pub fn with_mailbox(mut self, mailbox: FakeMailbox) -> Self {
        self.mailbox = Arc::new(mailbox);
        self
    }

    pub fn with_renderer(mut self, renderer: RecordingRenderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn with_uploader(mut self, uploader: FakeUploader) -> Self {
        self.uploader = Arc::new(uploader);
        self
    }

    pub fn with_claim_policy(mut self, policy: ClaimPolicy) -> Self {
        self.config.claim_policy = policy;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.config.max_results = max_results;
        self
    }

    pub fn runner(&self) -> RuleRunner {
        let observer: Arc<dyn RunObserver> = self.observer.clone();
        RuleRunner::new(
            self.db.clone(),
            self.credentials.clone(),
            self.mailbox.clone(),
            self.renderer.clone(),
            self.uploader.clone(),
        )
        .with_config(self.config.clone())
        .with_observer(observer)
    }

    pub fn dedup(&self) -> DedupLedger {
        DedupLedger::new(self.db.clone())
    }

    pub fn runs(&self) -> RunLedger {
        RunLedger::new(self.db.clone())
    }
}
