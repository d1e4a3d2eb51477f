use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::{Config, StorageBackend};
use crate::error::ConfigError;

/// Env var naming the config file.
pub const CONFIG_ENV_VAR: &str = "MAIL2DRIVE_CONFIG";

const MAX_RESULTS_LIMIT: u32 = 100;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the file named by `MAIL2DRIVE_CONFIG`, or the defaults when it is
/// unset.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => load_config(path.trim()),
        _ => {
            let config = Config::default();
            validate_config(&config)?;
            Ok(config)
        }
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.bind_addr.parse::<SocketAddr>().is_err() {
        return Err(invalid(format!("bindAddr '{}' is not a socket address", config.bind_addr)));
    }

    if !(1..=MAX_RESULTS_LIMIT).contains(&config.max_results_per_run) {
        return Err(invalid(format!(
            "maxResultsPerRun must be between 1 and {}",
            MAX_RESULTS_LIMIT
        )));
    }

    if config.credential_cache_ttl_secs == 0 {
        return Err(invalid("credentialCacheTtlSecs must be positive"));
    }

    if config.stale_run_after_secs == 0 {
        return Err(invalid("staleRunAfterSecs must be positive"));
    }

    if config.scheduler.enabled && config.scheduler.interval_secs == 0 {
        return Err(invalid("scheduler.intervalSecs must be positive"));
    }

    if config.storage.backend == StorageBackend::Filesystem
        && config.storage.root.as_deref().is_none_or(|r| r.trim().is_empty())
    {
        return Err(invalid("storage.root is required for the filesystem backend"));
    }

    if let Some(header) = &config.cron.trusted_header {
        if header_name(header).is_none() {
            return Err(invalid(format!("cron.trustedHeader '{}' is not a header name", header)));
        }
    }

    Ok(())
}

/// Lowercased header name if it only uses token characters.
fn header_name(name: &str) -> Option<String> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c));
    valid.then(|| name.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ClaimPolicy;
    use serial_test::serial;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.max_results_per_run, 5);
        assert_eq!(config.claim_policy, ClaimPolicy::ClaimOnAttempt);
        assert_eq!(config.credential_cache_ttl_secs, 300);
        assert_eq!(config.stale_run_after_secs, 3600);
        assert!(!config.scheduler.enabled);
        assert_eq!(config.storage.backend, StorageBackend::GoogleDrive);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "databasePath": "/var/lib/mail2drive/db.sqlite",
            "bindAddr": "0.0.0.0:3000",
            "maxResultsPerRun": 20,
            "claimPolicy": "claimOnSuccess",
            "scheduler": { "enabled": true, "intervalSecs": 60 },
            "cron": { "secretEnvVar": "CRON_SECRET", "trustedHeader": "x-vercel-cron" },
            "google": { "gmailApiBase": "http://localhost:9000/gmail/v1" },
            "storage": { "backend": "filesystem", "root": "/srv/archive" },
            "logging": { "json": true }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.database_path().to_str(), Some("/var/lib/mail2drive/db.sqlite"));
        assert_eq!(config.max_results_per_run, 20);
        assert_eq!(config.claim_policy, ClaimPolicy::ClaimOnSuccess);
        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(config.cron.trusted_header.as_deref(), Some("x-vercel-cron"));
        assert_eq!(config.google.gmail_api_base, "http://localhost:9000/gmail/v1");
        assert_eq!(config.google.token_url, "https://oauth2.googleapis.com/token");
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert!(config.logging.json);
    }

    #[test]
    fn test_validation_failures() {
        for json in [
            r#"{"maxResultsPerRun": 0}"#,
            r#"{"maxResultsPerRun": 101}"#,
            r#"{"bindAddr": "localhost"}"#,
            r#"{"storage": {"backend": "filesystem"}}"#,
            r#"{"scheduler": {"enabled": true, "intervalSecs": 0}}"#,
            r#"{"cron": {"trustedHeader": "bad header"}}"#,
        ] {
            assert!(
                matches!(load_config_from_str(json), Err(ConfigError::Validation { .. })),
                "{}",
                json
            );
        }
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{not json"),
            Err(ConfigError::ParseJson(_))
        ));
        assert!(matches!(
            load_config_from_str(r#"{"claimPolicy": "sometimes"}"#),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/mail2drive.json"),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"maxResultsPerRun": 7}"#).unwrap();

        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let config = load_config_from_env().unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(config.max_results_per_run, 7);

        assert_eq!(load_config_from_env().unwrap().max_results_per_run, 5);
    }

    #[test]
    #[serial]
    fn test_cron_secret_resolution() {
        std::env::set_var("M2D_TEST_CRON_SECRET", "s3cret\n");
        let config = load_config_from_str(r#"{"cron": {"secretEnvVar": "M2D_TEST_CRON_SECRET"}}"#).unwrap();
        let secret = config.cron.resolve_secret().unwrap().unwrap();
        std::env::remove_var("M2D_TEST_CRON_SECRET");

        use secrecy::ExposeSecret;
        assert_eq!(secret.expose_secret(), "s3cret");
        assert!(load_config_from_str("{}").unwrap().cron.resolve_secret().unwrap().is_none());
    }

    #[test]
    #[serial]
    fn test_google_client_resolution() {
        let config = load_config_from_str(
            r#"{"google": {"clientId": "id-1", "clientSecret": "sec", "clientIdEnvVar": null, "clientSecretEnvVar": null}}"#,
        )
        .unwrap();
        let (id, _secret) = config.google.resolve_client().unwrap().unwrap();
        assert_eq!(id, "id-1");

        let half = load_config_from_str(
            r#"{"google": {"clientId": "id-1", "clientIdEnvVar": null, "clientSecretEnvVar": "M2D_TEST_UNSET_SECRET"}}"#,
        )
        .unwrap();
        assert!(matches!(
            half.google.resolve_client(),
            Err(ConfigError::Validation { .. })
        ));
    }
}
