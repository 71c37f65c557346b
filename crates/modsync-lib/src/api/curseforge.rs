//! CurseForge API client
//!
//! Only used to turn a project/file id pair into a signed download URL.

use crate::error::{PackError, Result};
use crate::installer::config::CURSEFORGE_API_URL;
use crate::installer::core::downloader::HttpTransport;
use crate::installer::core::traits::DownloadUrlResolver;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct CFDownloadUrlResponse {
    data: String,
}

pub struct CurseForgeClient {
    transport: Arc<HttpTransport>,
    api_key: Option<String>,
    base_url: String,
}

impl CurseForgeClient {
    /// `api_key` is sourced by the caller; `None` or blank makes every lookup
    /// fail with [`PackError::MissingCredential`] without touching the network.
    pub fn new(transport: Arc<HttpTransport>, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            log::debug!("CurseForgeClient created without an API key");
        }
        Self {
            transport,
            api_key,
            base_url: CURSEFORGE_API_URL.to_string(),
        }
    }

    /// Point the client at another API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask CurseForge for the download URL of one file
    pub async fn get_download_url(
        &self,
        project_id: u32,
        file_id: u32,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(PackError::MissingCredential)?;

        let url = format!(
            "{}/v1/mods/{}/files/{}/download-url",
            self.base_url, project_id, file_id
        );
        let response: CFDownloadUrlResponse = self
            .transport
            .fetch_json(&url, &[("x-api-key", api_key)], cancel)
            .await?;

        log::debug!(
            "Resolved CurseForge file {}/{} -> {}",
            project_id,
            file_id,
            response.data
        );
        Ok(response.data)
    }
}

impl DownloadUrlResolver for CurseForgeClient {
    fn resolve_download_url<'a>(
        &'a self,
        project_id: u32,
        file_id: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String>> {
        self.get_download_url(project_id, file_id, cancel).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> Arc<HttpTransport> {
        Arc::new(HttpTransport::new(None).unwrap())
    }

    #[tokio::test]
    async fn resolves_download_url_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/mods/238222/files/4712011/download-url"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": "https://edge.forgecdn.net/files/4712/11/jei.jar"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CurseForgeClient::new(transport(), Some("test-key".to_string()))
            .with_base_url(server.uri());
        let url = client
            .resolve_download_url(238222, 4712011, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(url, "https://edge.forgecdn.net/files/4712/11/jei.jar");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = CurseForgeClient::new(transport(), Some("   ".to_string()))
            .with_base_url(server.uri());
        assert!(!client.has_credential());

        let err = client
            .get_download_url(1, 2, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::MissingCredential));
    }

    #[tokio::test]
    async fn api_failure_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client =
            CurseForgeClient::new(transport(), Some("k".to_string())).with_base_url(server.uri());
        let err = client
            .get_download_url(1, 2, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
