//! Gmail REST client (`users.messages.list` / `users.messages.get`).

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::{MailboxClient, MailboxError, MessageContent};
use crate::credentials::oauth::http_client;
use crate::credentials::Credential;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

impl MessageResponse {
    fn header(&self, name: &str) -> String {
        self.payload
            .as_ref()
            .and_then(|p| p.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name)))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }

    fn into_content(self) -> MessageContent {
        MessageContent {
            subject: self.header("Subject"),
            from: self.header("From"),
            to: self.header("To"),
            date: self.header("Date"),
            body_text: unescape_snippet(&self.snippet),
            id: self.id,
        }
    }
}

/// Snippets come HTML-escaped.
fn unescape_snippet(snippet: &str) -> String {
    snippet
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

async fn check(response: Response) -> Result<Response, MailboxError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(200).collect();
    Err(MailboxError::Http { status, message })
}

/// Reads message metadata and snippets; never modifies the mailbox.
pub struct GmailClient {
    client: Client,
    base_url: String,
}

impl GmailClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, MailboxError> {
        let client = http_client().map_err(|e| MailboxError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MailboxClient for GmailClient {
    async fn search(&self, credential: &Credential, query: &str, max_results: u32) -> Result<Vec<String>, MailboxError> {
        let url = format!("{}/users/me/messages", self.base_url);
        let max = max_results.to_string();
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.access_token().expose_secret())
            .query(&[("q", query), ("maxResults", max.as_str())])
            .send()
            .await
            .map_err(|e| MailboxError::Transport(e.to_string()))?;

        let list: ListResponse = check(response)
            .await?
            .json()
            .await
            .map_err(|e| MailboxError::Decode(e.to_string()))?;

        Ok(list
            .messages
            .into_iter()
            .map(|m| m.id)
            .filter(|id| !id.is_empty())
            .take(max_results as usize)
            .collect())
    }

    async fn fetch(&self, credential: &Credential, message_id: &str) -> Result<MessageContent, MailboxError> {
        let url = format!("{}/users/me/messages/{}", self.base_url, message_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.access_token().expose_secret())
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "To"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await
            .map_err(|e| MailboxError::Transport(e.to_string()))?;

        let message: MessageResponse = check(response)
            .await?
            .json()
            .await
            .map_err(|e| MailboxError::Decode(e.to_string()))?;

        Ok(message.into_content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::{routing::get, Json, Router};
    use secrecy::SecretString;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn credential() -> Credential {
        Credential::new(SecretString::from("ya29.test".to_string()), None)
    }

    #[tokio::test]
    async fn test_search_passes_query_and_limit() {
        let router = Router::new().route(
            "/users/me/messages",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(headers["authorization"], "Bearer ya29.test");
                assert_eq!(q["q"], "subject:(\"請求書\")");
                assert_eq!(q["maxResults"], "5");
                Json(serde_json::json!({
                    "messages": [{"id": "m1", "threadId": "t1"}, {"id": "m2", "threadId": "t2"}]
                }))
            }),
        );
        let client = GmailClient::new(serve(router).await).unwrap();

        let ids = client.search(&credential(), "subject:(\"請求書\")", 5).await.unwrap();
        assert_eq!(ids, vec!["m1".to_string(), "m2".to_string()]);
    }

    #[tokio::test]
    async fn test_search_without_matches() {
        let router = Router::new().route(
            "/users/me/messages",
            get(|| async { Json(serde_json::json!({"resultSizeEstimate": 0})) }),
        );
        let client = GmailClient::new(serve(router).await).unwrap();
        assert!(client.search(&credential(), "x", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_reads_headers_and_snippet() {
        let router = Router::new().route(
            "/users/me/messages/{id}",
            get(|Path(id): Path<String>| async move {
                Json(serde_json::json!({
                    "id": id,
                    "snippet": "Your invoice &amp; receipt &#39;March&#39;",
                    "payload": {"headers": [
                        {"name": "subject", "value": "Invoice March"},
                        {"name": "From", "value": "billing@example.com"},
                        {"name": "Date", "value": "Tue, 3 Mar 2026 10:00:00 +0900"}
                    ]}
                }))
            }),
        );
        let client = GmailClient::new(serve(router).await).unwrap();

        let msg = client.fetch(&credential(), "m1").await.unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.subject, "Invoice March");
        assert_eq!(msg.from, "billing@example.com");
        assert_eq!(msg.to, "");
        assert_eq!(msg.body_text, "Your invoice & receipt 'March'");
    }

    #[tokio::test]
    async fn test_http_error_carries_status() {
        let router = Router::new().route(
            "/users/me/messages",
            get(|| async { (StatusCode::UNAUTHORIZED, "invalid credentials") }),
        );
        let client = GmailClient::new(serve(router).await).unwrap();

        let err = client.search(&credential(), "x", 5).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
