use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::credentials::oauth::GOOGLE_TOKEN_URL;
use crate::engine::{ClaimPolicy, DEFAULT_MAX_RESULTS};
use crate::error::ConfigError;
use crate::mailbox::gmail::GMAIL_API_BASE;
use crate::scheduler::DEFAULT_STALE_RUN_AFTER_SECS;
use crate::secrets::{resolve_secret_optional, SecretError, TOKEN_KEY_ENV_VAR};
use crate::storage::drive::DRIVE_UPLOAD_BASE;

/// Top-level service configuration. Every field has a default, so `{}` is a
/// valid config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub database_path: Option<String>,
    pub bind_addr: String,
    pub max_results_per_run: u32,
    pub claim_policy: ClaimPolicy,
    pub credential_cache_ttl_secs: u64,
    pub stale_run_after_secs: u64,
    pub token_key_env_var: String,
    pub scheduler: SchedulerConfig,
    pub cron: CronConfig,
    pub google: GoogleConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            bind_addr: "127.0.0.1:8080".to_string(),
            max_results_per_run: DEFAULT_MAX_RESULTS,
            claim_policy: ClaimPolicy::default(),
            credential_cache_ttl_secs: 300,
            stale_run_after_secs: DEFAULT_STALE_RUN_AFTER_SECS as u64,
            token_key_env_var: TOKEN_KEY_ENV_VAR.to_string(),
            scheduler: SchedulerConfig::default(),
            cron: CronConfig::default(),
            google: GoogleConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Explicit path, else `~/.mail2drive/data/mail2drive.db`, else the
    /// working directory.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .or_else(crate::db::default_database_path)
            .unwrap_or_else(|| PathBuf::from("mail2drive.db"))
    }
}

/// In-process periodic batch runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 900,
        }
    }
}

/// Authentication of the external batch trigger endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CronConfig {
    pub secret: Option<String>,
    pub secret_file: Option<String>,
    pub secret_env_var: Option<String>,
    /// Header set by a trusted platform scheduler (e.g. `x-vercel-cron`).
    pub trusted_header: Option<String>,
}

impl CronConfig {
    /// Shared bearer secret, if one is configured.
    pub fn resolve_secret(&self) -> Result<Option<SecretString>, ConfigError> {
        resolve_secret_optional(
            self.secret.as_deref(),
            self.secret_file.as_deref(),
            self.secret_env_var.as_deref(),
        )
        .map_err(|source| ConfigError::Secret {
            name: "cron.secret",
            source,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_id_file: Option<String>,
    pub client_id_env_var: Option<String>,
    pub client_secret: Option<String>,
    pub client_secret_file: Option<String>,
    pub client_secret_env_var: Option<String>,
    pub token_url: String,
    pub gmail_api_base: String,
    pub drive_upload_base: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_id_file: None,
            client_id_env_var: Some("GOOGLE_CLIENT_ID".to_string()),
            client_secret: None,
            client_secret_file: None,
            client_secret_env_var: Some("GOOGLE_CLIENT_SECRET".to_string()),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            gmail_api_base: GMAIL_API_BASE.to_string(),
            drive_upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }
}

impl GoogleConfig {
    /// OAuth client credentials, or `None` when neither is configured.
    pub fn resolve_client(&self) -> Result<Option<(String, SecretString)>, ConfigError> {
        let client_id = resolve_secret_optional(
            self.client_id.as_deref(),
            self.client_id_file.as_deref(),
            self.client_id_env_var.as_deref(),
        );
        let client_secret = resolve_secret_optional(
            self.client_secret.as_deref(),
            self.client_secret_file.as_deref(),
            self.client_secret_env_var.as_deref(),
        );

        // Unset default env vars mean "not configured", not an error.
        let client_id = match client_id {
            Ok(v) => v,
            Err(SecretError::EnvVarNotSet { .. }) => None,
            Err(source) => {
                return Err(ConfigError::Secret {
                    name: "google.clientId",
                    source,
                })
            }
        };
        let client_secret = match client_secret {
            Ok(v) => v,
            Err(SecretError::EnvVarNotSet { .. }) => None,
            Err(source) => {
                return Err(ConfigError::Secret {
                    name: "google.clientSecret",
                    source,
                })
            }
        };

        match (client_id, client_secret) {
            (Some(id), Some(secret)) => Ok(Some((id.expose_secret().to_string(), secret))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::Validation {
                message: "google client id and client secret must be configured together".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageBackend {
    #[default]
    GoogleDrive,
    Filesystem,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend.
    pub root: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub json: bool,
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}
