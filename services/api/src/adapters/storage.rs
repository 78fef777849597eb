//! services/api/src/adapters/storage.rs
//!
//! This module contains the adapter for the external object store.
//! It implements the `FileStorageService` port from the `core` crate,
//! uploading raw file bytes over a bearer-authenticated multipart PUT.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use assurscan_core::domain::StoredFile;
use assurscan_core::ports::{FileStorageService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `FileStorageService` port against an
/// HTTP object store. Endpoint and token are optional so the service can
/// boot without storage credentials; uploads then fail with a
/// missing-configuration error.
#[derive(Clone)]
pub struct HttpStorageAdapter {
    client: reqwest::Client,
    endpoint: Option<String>,
    token: Option<String>,
}

impl HttpStorageAdapter {
    /// Creates a new `HttpStorageAdapter`.
    pub fn new(client: reqwest::Client, endpoint: Option<String>, token: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            token,
        }
    }
}

//=========================================================================================
// `FileStorageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl FileStorageService for HttpStorageAdapter {
    /// Uploads `bytes` under `key` and returns the store's `{key, url}` reply.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> PortResult<StoredFile> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| PortError::MissingConfig("STORAGE_ENDPOINT".to_string()))?;
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| PortError::MissingConfig("STORAGE_TOKEN".to_string()))?;

        let file_name = key.rsplit('/').next().unwrap_or(key).to_string();
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let form = Form::new().part("file", part);

        let url = format!("{}/{}", endpoint.trim_end_matches('/'), key);
        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PortError::Upstream {
                status: e.status().map_or(502, |s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PortError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<StoredFile>()
            .await
            .map_err(|e| PortError::InvalidPayload(format!("Malformed storage reply: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_endpoint_fails_before_any_request() {
        let adapter = HttpStorageAdapter::new(reqwest::Client::new(), None, None);
        let err = adapter
            .put("contracts/1-a.pdf", b"%PDF", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::MissingConfig(_)));
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let adapter = HttpStorageAdapter::new(
            reqwest::Client::new(),
            Some("https://store.example".to_string()),
            None,
        );
        let err = adapter
            .put("contracts/1-a.pdf", b"%PDF", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::MissingConfig(_)));
    }
}
