//! Google Drive multipart upload (`files.create`).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::{StorageUploader, UploadError, UploadedFile};
use crate::credentials::oauth::http_client;
use crate::credentials::Credential;

pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

pub struct DriveUploader {
    client: Client,
    base_url: String,
}

impl DriveUploader {
    pub fn new(base_url: impl Into<String>) -> Result<Self, UploadError> {
        let client = http_client().map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn form(folder_id: &str, filename: &str, bytes: Vec<u8>) -> Result<Form, UploadError> {
        let metadata = serde_json::json!({
            "name": filename,
            "parents": [folder_id],
            "mimeType": PDF_MIME_TYPE,
        });
        let metadata = Part::text(metadata.to_string())
            .mime_str("application/json; charset=UTF-8")
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let media = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(PDF_MIME_TYPE)
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(Form::new().part("metadata", metadata).part("file", media))
    }
}

#[async_trait]
impl StorageUploader for DriveUploader {
    async fn upload(
        &self,
        credential: &Credential,
        folder_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, UploadError> {
        let url = format!("{}/files", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.access_token().expose_secret())
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .multipart(Self::form(folder_id, filename, bytes)?)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(200).collect();
            return Err(UploadError::Http { status, message });
        }

        let created: CreatedFile = response
            .json()
            .await
            .map_err(|e| UploadError::Decode(e.to_string()))?;
        if created.id.is_empty() {
            return Err(UploadError::Decode("response carried no file id".to_string()));
        }

        Ok(UploadedFile {
            file_id: created.id,
            web_view_link: created.web_view_link,
        })
    }
}
