use crate::error::{PackError, Result};
use crate::installer::config;
use crate::utils::hash::{verify, HashFormat};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// HTTP access for the resolver and installer.
///
/// Every request carries [`config::USER_AGENT`] and goes through the
/// configured proxy, if any. There is no retry or caching here; a failure is
/// returned to the caller as-is.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport, optionally routed through a `<host>:<port>` proxy
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config::USER_AGENT)
            .timeout(config::current_timeout());

        if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
            let proxy_url = config::proxy_url(proxy);
            let proxy = reqwest::Proxy::all(&proxy_url).map_err(|e| PackError::InvalidUrl {
                url: proxy_url.clone(),
                reason: e.to_string(),
            })?;
            log::debug!("Routing requests through proxy {}", proxy_url);
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| PackError::Transport {
            url: String::new(),
            source: e,
        })?;
        Ok(Self { client })
    }

    /// Download `url` into memory
    pub async fn fetch_bytes(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        cancellable(cancel, self.fetch_bytes_inner(url)).await
    }

    async fn fetch_bytes_inner(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("Downloading to memory: {}", url);
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        if !response.status().is_success() {
            return Err(PackError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| transport_error(url, e))?;
        log::debug!(
            "Downloaded {} bytes from {} in {:.2}s",
            bytes.len(),
            url,
            start.elapsed().as_secs_f64()
        );
        Ok(bytes.to_vec())
    }

    /// Download `url` and check it against `expected` under `format`
    pub async fn fetch_verified(
        &self,
        url: &str,
        format: HashFormat,
        expected: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let bytes = self.fetch_bytes(url, cancel).await?;

        if !verify(&bytes, format, expected) {
            return Err(PackError::Integrity {
                url: url.to_string(),
                algorithm: format.to_string(),
                expected: expected.to_string(),
                actual: format.digest(&bytes),
            });
        }
        log::debug!("{} validated for {}", format, url);
        Ok(bytes)
    }

    /// Download JSON with extra request headers and deserialize
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T> {
        cancellable(cancel, async {
            log::debug!("Downloading JSON: {}", url);
            let mut request = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            let response = request.send().await.map_err(|e| transport_error(url, e))?;
            if !response.status().is_success() {
                return Err(PackError::HttpStatus {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }

            response.json::<T>().await.map_err(|e| transport_error(url, e))
        })
        .await
    }
}

fn transport_error(url: &str, source: reqwest::Error) -> PackError {
    PackError::Transport {
        url: url.to_string(),
        source,
    }
}

/// Run `fut` unless `cancel` fires first
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(PackError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PackError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_bytes_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let url = format!("{}/missing", server.uri());
        let err = transport
            .fetch_bytes(&url, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::HttpStatus { status: 404, .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn fetch_verified_distinguishes_integrity_from_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .and(header("user-agent", config::USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let url = format!("{}/file", server.uri());
        let cancel = CancellationToken::new();

        let good = HashFormat::Sha256.digest(b"payload").to_uppercase();
        let bytes = transport
            .fetch_verified(&url, HashFormat::Sha256, &good, &cancel)
            .await
            .unwrap();
        assert_eq!(bytes, b"payload");

        // Same trimming rules as hash::verify
        let padded = format!("  {}\n", good);
        assert!(transport
            .fetch_verified(&url, HashFormat::Sha256, &padded, &cancel)
            .await
            .is_ok());

        let err = transport
            .fetch_verified(&url, HashFormat::Sha256, "deadbeef", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::Integrity { .. }));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn fetch_returns_promptly_when_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = transport
            .fetch_bytes(&format!("{}/slow", server.uri()), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::Cancelled));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn fetch_json_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .and(header("x-api-key", "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": "ok" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let value: serde_json::Value = transport
            .fetch_json(
                &format!("{}/json", server.uri()),
                &[("x-api-key", "secret")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["data"], "ok");
    }
}
