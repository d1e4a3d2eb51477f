//! OAuth2 refresh-token grant against the Google token endpoint.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Google's token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error bodies are truncated before they reach logs or run messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_error_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

/// Shared HTTP client with the timeouts every provider call uses.
pub(crate) fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// A freshly issued access token.
#[derive(Debug)]
pub struct RefreshedToken {
    pub access_token: SecretString,
    pub expires_in: Option<u64>,
}

#[derive(Error, Debug)]
pub enum RefreshError {
    /// The provider revoked or rejected the refresh token.
    #[error("refresh token rejected ({0})")]
    InvalidGrant(String),

    #[error("token endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("token request failed: {0}")]
    Transport(String),
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshedToken, RefreshError>;
}

/// Refresh client for Google OAuth.
pub struct GoogleTokenClient {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl GoogleTokenClient {
    pub fn new(token_url: String, client_id: String, client_secret: SecretString) -> Result<Self, RefreshError> {
        let client = http_client().map_err(|e| RefreshError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            token_url,
            client_id,
            client_secret,
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl TokenRefresher for GoogleTokenClient {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshedToken, RefreshError> {
        info!("Refreshing access token");

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
                if err.error == "invalid_grant" {
                    return Err(RefreshError::InvalidGrant(err.error));
                }
            }
            return Err(RefreshError::Http {
                status,
                body: truncate_error_body(&body),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Transport(format!("Failed to parse refresh response: {}", e)))?;

        info!("Successfully refreshed access token");
        Ok(RefreshedToken {
            access_token: SecretString::from(token.access_token),
            expires_in: token.expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Form, Json, Router};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/token", addr)
    }

    fn client(url: String) -> GoogleTokenClient {
        GoogleTokenClient::new(url, "client-id".to_string(), SecretString::from("client-secret".to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let router = Router::new().route(
            "/token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
                assert_eq!(form.get("refresh_token").map(String::as_str), Some("1//refresh"));
                Json(serde_json::json!({"access_token": "ya29.new", "expires_in": 3599}))
            }),
        );
        let url = serve(router).await;

        let token = client(url)
            .refresh(&SecretString::from("1//refresh".to_string()))
            .await
            .unwrap();
        assert_eq!(token.access_token.expose_secret(), "ya29.new");
        assert_eq!(token.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_refresh_invalid_grant() {
        let router = Router::new().route(
            "/token",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": "invalid_grant"})),
                )
            }),
        );
        let url = serve(router).await;

        let err = client(url)
            .refresh(&SecretString::from("revoked".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn test_refresh_server_error() {
        let router = Router::new().route("/token", post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }));
        let url = serve(router).await;

        let err = client(url)
            .refresh(&SecretString::from("r".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Http { status: 503, .. }));
    }

    #[test]
    fn test_truncate_error_body() {
        assert_eq!(truncate_error_body("short"), "short");
        let long = "x".repeat(500);
        assert!(truncate_error_body(&long).ends_with("(truncated)"));
    }
}
