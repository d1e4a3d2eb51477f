//! Shared application state for the HTTP handlers.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use mail2drive::config::StorageBackend;
use mail2drive::credentials::{CachedCredentialResolver, CredentialResolver, GoogleTokenClient, StoredCredentialResolver};
use mail2drive::engine::EngineConfig;
use mail2drive::mailbox::{GmailClient, MailboxClient};
use mail2drive::render::PdfRenderer;
use mail2drive::scheduler::BatchTrigger;
use mail2drive::storage::{DriveUploader, FilesystemUploader, StorageUploader};
use mail2drive::{resolve_secret, Config, ConfigError, Database, RuleRunner, TokenEncryptor};
use secrecy::SecretString;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open database: {0}")]
    Database(#[from] mail2drive::DatabaseError),

    #[error("Token encryption key unavailable: {0}")]
    TokenKey(#[from] mail2drive::SecretError),

    #[error("Failed to build {component}: {message}")]
    Client { component: &'static str, message: String },
}

/// Who may call the batch trigger endpoint.
#[derive(Clone, Default)]
pub struct CronAuth {
    /// Shared secret expected as `Authorization: Bearer <secret>`.
    pub secret: Option<Arc<SecretString>>,
    /// Lowercased header a trusted platform scheduler sets.
    pub trusted_header: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub runner: Arc<RuleRunner>,
    pub batch: Arc<BatchTrigger>,
    pub credentials: Arc<dyn CredentialResolver>,
    pub encryptor: Arc<TokenEncryptor>,
    pub cron: CronAuth,
}

impl AppState {
    /// Wires the production collaborators from config.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let db = Database::open(&config.database_path())?;
        info!("Database ready at {:?}", config.database_path());

        let key = resolve_secret(None, None, Some(&config.token_key_env_var))?;
        let encryptor = Arc::new(TokenEncryptor::from_secret(&key)?);

        let (client_id, client_secret) = config.google.resolve_client()?.ok_or_else(|| ConfigError::Validation {
            message: "google client id and secret are required".to_string(),
        })?;
        let refresher = GoogleTokenClient::new(config.google.token_url.clone(), client_id, client_secret)
            .map_err(|e| client_error("token client", e))?;
        let credentials: Arc<dyn CredentialResolver> = Arc::new(CachedCredentialResolver::new(
            StoredCredentialResolver::new(db.clone(), Arc::clone(&encryptor), refresher),
            Duration::from_secs(config.credential_cache_ttl_secs),
        ));

        let mailbox: Arc<dyn MailboxClient> = Arc::new(
            GmailClient::new(config.google.gmail_api_base.clone()).map_err(|e| client_error("mailbox client", e))?,
        );
        let uploader: Arc<dyn StorageUploader> = match config.storage.backend {
            StorageBackend::GoogleDrive => Arc::new(
                DriveUploader::new(config.google.drive_upload_base.clone())
                    .map_err(|e| client_error("drive uploader", e))?,
            ),
            StorageBackend::Filesystem => {
                Arc::new(FilesystemUploader::new(config.storage.root.clone().unwrap_or_default()))
            }
        };

        let runner = RuleRunner::new(
            db.clone(),
            Arc::clone(&credentials),
            mailbox,
            Arc::new(PdfRenderer::new()),
            uploader,
        )
        .with_config(EngineConfig {
            max_results: config.max_results_per_run,
            claim_policy: config.claim_policy,
        });

        let cron = CronAuth {
            secret: config.cron.resolve_secret()?.map(Arc::new),
            trusted_header: config.cron.trusted_header.as_deref().map(str::to_ascii_lowercase),
        };

        let stale_after = chrono::Duration::seconds(config.stale_run_after_secs as i64);
        Ok(Self::new(db, Arc::new(runner), credentials, encryptor, cron).with_stale_after(stale_after))
    }

    pub fn new(
        db: Database,
        runner: Arc<RuleRunner>,
        credentials: Arc<dyn CredentialResolver>,
        encryptor: Arc<TokenEncryptor>,
        cron: CronAuth,
    ) -> Self {
        let batch = Arc::new(BatchTrigger::new(db.clone(), Arc::clone(&runner)));
        Self {
            db,
            runner,
            batch,
            credentials,
            encryptor,
            cron,
        }
    }

    fn with_stale_after(mut self, stale_after: chrono::Duration) -> Self {
        self.batch = Arc::new(BatchTrigger::new(self.db.clone(), Arc::clone(&self.runner)).with_stale_after(stale_after));
        self
    }
}

fn client_error(component: &'static str, err: impl std::fmt::Display) -> StartupError {
    StartupError::Client {
        component,
        message: err.to_string(),
    }
}
