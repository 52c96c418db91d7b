//! Generation backend adapter.
//!
//! Wraps the external AI image-generation service behind a
//! synchronous-looking async call: multipart `POST /generate-art` with the
//! signature image and prompts, raw generated image bytes back. A single
//! call can block for tens of seconds (the backend is GPU-bound), so
//! callers await it without holding anything else up.
//!
//! [`GenerationBackend`] is the seam the worker pool is generic over;
//! tests substitute scripted implementations.

use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::error::{Error, Result};

/// The slow external generation call.
pub trait GenerationBackend: Send + Sync + 'static {
    fn generate(
        &self,
        prompt: &str,
        negative_prompt: &str,
        signature_png: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// HTTP client for the real generation service.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // Generation runs for tens of seconds; the request timeout has to
        // outlast the slowest expected inference.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::Other(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// One readiness probe: 200 from `GET /health` means the backend has
    /// finished loading its models.
    pub async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Backend {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// Block until the backend answers its health check, probing on a
    /// fixed interval. Called before the worker pool starts accepting
    /// leases, so a freshly deployed backend that is still warming up
    /// doesn't cause a burst of avoidable failures.
    pub async fn wait_until_ready(&self, interval: Duration) {
        info!(url = %self.base_url, "checking generation backend readiness");
        loop {
            match self.health().await {
                Ok(()) => {
                    info!("generation backend is ready");
                    return;
                }
                Err(e) => {
                    info!(
                        retry_in_secs = interval.as_secs(),
                        "generation backend not ready: {e}"
                    );
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
}

impl GenerationBackend for HttpBackend {
    async fn generate(
        &self,
        prompt: &str,
        negative_prompt: &str,
        signature_png: &[u8],
    ) -> Result<Vec<u8>> {
        let form = reqwest::multipart::Form::new()
            .part(
                "image",
                reqwest::multipart::Part::bytes(signature_png.to_vec())
                    .file_name("signature.png")
                    .mime_str("image/png")
                    .map_err(|e| Error::Other(format!("invalid mime type: {e}")))?,
            )
            .text("prompt", prompt.to_string())
            .text("negative_prompt", negative_prompt.to_string());

        let response = self
            .client
            .post(format!("{}/generate-art", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_stripped() {
        let backend = HttpBackend::new("http://ai-service:8000/").unwrap();
        assert_eq!(backend.base_url, "http://ai-service:8000");
    }
}
