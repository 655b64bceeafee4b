use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::transport::{decode_response, error_for_status, HttpRequest, HttpTransport, Transport};
use crate::types::*;

/// Decides whether downloaded bytes are a usable image.
pub trait AssetValidator: Send + Sync {
    fn is_decodable(&self, bytes: &[u8]) -> bool;
}

/// Accepts anything the `image` crate can decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodableImage;

impl AssetValidator for DecodableImage {
    fn is_decodable(&self, bytes: &[u8]) -> bool {
        image::load_from_memory(bytes).is_ok()
    }
}

impl<F> AssetValidator for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn is_decodable(&self, bytes: &[u8]) -> bool {
        self(bytes)
    }
}

/// Async client for the sticker generation service.
///
/// Every method maps to one HTTP call; [`StickerClient::generate`] composes
/// them into a full cancellable run. The client is cheap to clone and clones
/// share one transport.
///
/// # Example
/// ```no_run
/// use sticker_client::{ClientConfig, GenerationRequest, StickerClient};
///
/// # async fn example() -> sticker_client::Result<()> {
/// let client = StickerClient::new(ClientConfig::default())?;
/// let handle = client.submit(&GenerationRequest::new("Bismillah")).await?;
/// let status = client.task_status(&handle.task_id).await?;
/// println!("{}% - {}", status.progress, status.current_step);
/// # Ok(())
/// # }
/// ```
pub struct StickerClient<T = HttpTransport> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
    validator: Arc<dyn AssetValidator>,
}

impl<T> Clone for StickerClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            validator: Arc::clone(&self.validator),
        }
    }
}

impl<T> std::fmt::Debug for StickerClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickerClient")
            .field("base_url", &self.config.base_url)
            .field("request_timeout", &self.config.request_timeout)
            .finish()
    }
}

impl StickerClient<HttpTransport> {
    /// Create a client over HTTP using `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> StickerClient<T> {
    /// Create a client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            config: Arc::new(config),
            validator: Arc::new(DecodableImage),
        }
    }

    /// Replace the image decodability check.
    pub fn with_validator(mut self, validator: impl AssetValidator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the URL for `segments` under the base URL, percent-encoding each.
    pub fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let mut url = url::Url::parse(&self.config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    async fn dispatch<R: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<R> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "sending request");
        let response = self
            .transport
            .execute(HttpRequest {
                method,
                url: url.clone(),
                body,
                timeout,
                max_body_bytes: None,
            })
            .await?;
        debug!(%url, status = response.status, bytes = response.body.len(), "received response");
        decode_response(&response)
    }

    async fn get<R: DeserializeOwned>(&self, segments: &[&str], timeout: Duration) -> Result<R> {
        self.dispatch(Method::GET, segments, None, timeout).await
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
        timeout: Duration,
    ) -> Result<R> {
        let body = serde_json::to_vec(body).map_err(ApiError::Encoding)?;
        self.dispatch(Method::POST, segments, Some(body), timeout)
            .await
    }

    // ── Generation ──────────────────────────────────────────────────

    /// Submit a generation request. Returns the accepted task.
    ///
    /// Never retried: a second submit would create a second job.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<TaskHandle> {
        if request.phrase.trim().is_empty() {
            return Err(ApiError::Validation("phrase must not be empty".into()));
        }
        let accepted: TaskAccepted = self
            .post(&["generate-sticker"], request, self.config.request_timeout)
            .await?;
        let handle = accepted.into_handle()?;
        info!(
            task_id = %handle.task_id,
            estimated_seconds = handle.estimated_seconds,
            "sticker task accepted"
        );
        Ok(handle)
    }

    /// Fetch the current status of a task (one GET, no looping).
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        self.get(&["task-status", task_id], self.config.request_timeout)
            .await
    }

    /// Fetch the final result of a completed task.
    pub async fn task_result(&self, task_id: &str) -> Result<TaskResult> {
        self.get(&["task-result", task_id], self.config.request_timeout)
            .await
    }

    /// Download an asset and check that it decodes as an image.
    ///
    /// The reference may point at a different host than the API. Failures
    /// here do not heal on retry, so callers should treat them as final.
    pub async fn download_asset(&self, reference: &str) -> Result<Vec<u8>> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ApiError::NoAssetReference);
        }
        let url = url::Url::parse(reference)
            .map_err(|e| ApiError::InvalidUrl(format!("{reference}: {e}")))?;

        let response = self
            .transport
            .execute(HttpRequest {
                method: Method::GET,
                url: url.to_string(),
                body: None,
                timeout: self.config.request_timeout,
                max_body_bytes: Some(self.config.max_asset_bytes),
            })
            .await
            .map_err(|e| ApiError::AssetDownloadFailed(e.to_string()))?;

        if response.status != 200 {
            return Err(ApiError::AssetDownloadFailed(format!(
                "HTTP {} from {}",
                response.status, url
            )));
        }
        if response.body.len() > self.config.max_asset_bytes {
            return Err(ApiError::AssetDownloadFailed(format!(
                "asset is {} bytes, limit is {}",
                response.body.len(),
                self.config.max_asset_bytes
            )));
        }
        if !self.validator.is_decodable(&response.body) {
            return Err(ApiError::InvalidAssetData);
        }

        debug!(%url, bytes = response.body.len(), "asset downloaded");
        Ok(response.body)
    }

    /// Ask the server to cancel a task.
    pub async fn cancel_task(&self, task_id: &str) -> Result<()> {
        let url = self.endpoint(&["task", task_id])?;
        let response = self
            .transport
            .execute(HttpRequest {
                method: Method::DELETE,
                url,
                body: None,
                timeout: self.config.cancel_timeout,
                max_body_bytes: None,
            })
            .await?;

        match response.status {
            200 => {
                info!(%task_id, "task cancelled on server");
                Ok(())
            }
            201..=299 => Err(ApiError::Http {
                status: response.status,
            }),
            _ => Err(error_for_status(&response)),
        }
    }

    // ── Probes ──────────────────────────────────────────────────────

    /// Fetch the service health report.
    pub async fn health(&self) -> Result<HealthReport> {
        self.get(&["health"], self.config.probe_timeout).await
    }

    /// Whether the service reports itself healthy. Errors count as unhealthy.
    pub async fn is_healthy(&self) -> bool {
        match self.health().await {
            Ok(report) => report.is_healthy(),
            Err(e) => {
                warn!(error = %e, "health check failed");
                false
            }
        }
    }

    /// Fetch example phrases.
    pub async fn examples(&self) -> Result<Examples> {
        self.get(&["examples"], self.config.probe_timeout).await
    }

    /// Hit the service's connectivity test endpoint.
    pub async fn test_connection(&self) -> Result<ConnectionTest> {
        self.get(&["test"], self.config.probe_timeout).await
    }
}
