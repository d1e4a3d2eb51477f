pub mod config;
pub mod credentials;
pub mod db;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod mailbox;
pub mod render;
pub mod rules;
pub mod sanitize;
pub mod scheduler;
pub mod secrets;
pub mod storage;
pub mod telemetry;

pub use config::{load_config, load_config_from_env, load_config_from_str, Config};
pub use credentials::{CachedCredentialResolver, Credential, CredentialError, CredentialResolver, StoredCredentialResolver};
pub use db::{Database, DatabaseError};
pub use engine::{ClaimPolicy, EngineConfig, EngineError, RuleRunner, RunError, RunOutcome, RunStep};
pub use error::{ConfigError, Mail2DriveError, Result};
pub use ledger::{ClaimOutcome, DedupLedger, RunLedger, RunRecord, RunStatus, Trigger};
pub use mailbox::{GmailClient, MailboxClient, MessageContent};
pub use render::{DocumentRenderer, PdfRenderer, RenderRequest};
pub use rules::{evaluate, build_search_expression, Rule, RuleInput, RuleStatus, RuleSummary};
pub use scheduler::{BatchReport, BatchTrigger, PeriodicScheduler};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError, TokenEncryptor};
pub use storage::{DriveUploader, FilesystemUploader, StorageUploader, UploadedFile};
