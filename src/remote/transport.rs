//! Transports to the remote batch service

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, error, info};

use crate::config::RemoteConfig;
use crate::error::{HybridResizeError, Result};
use crate::remote::wire::{decode_batch_response, BatchRequest, RemoteBatchReply};
use crate::routing::{HealthProbe, HealthSample};

/// Body marker of a deployment without remote processing
const DEVELOPMENT_MARKER: &str = "development environment";

/// Sends one batch (at most ten items) to the remote service
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn send_batch(&self, request: &BatchRequest) -> Result<RemoteBatchReply>;
}

/// HTTP transport to the remote functions
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    health_timeout: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("health_timeout", &self.health_timeout)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport from the remote configuration
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| HybridResizeError::config("Remote base URL is not configured"))?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| HybridResizeError::config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Created HttpTransport for base_url: {}, timeout: {}ms",
            base_url, config.request_timeout_ms
        );

        Ok(Self {
            client,
            base_url,
            health_timeout: Duration::from_millis(config.health_timeout_ms),
        })
    }

    fn endpoint(&self, function: &str) -> String {
        format!("{}/{}", self.base_url, function)
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn send_batch(&self, request: &BatchRequest) -> Result<RemoteBatchReply> {
        let url = self.endpoint("batch-processor");
        debug!(
            "Sending batch {} ({} images) to {}",
            request.batch_id,
            request.images.len(),
            url
        );

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Batch request failed: {}", status);
        }

        decode_batch_response(status.as_u16(), &body)
    }
}

#[async_trait]
impl HealthProbe for HttpTransport {
    async fn probe(&self) -> HealthSample {
        let url = self.endpoint("image-processor");
        let start = Instant::now();

        // The body of a 503 is read under the same deadline as the headers
        let exchange = async {
            let response = self.client.request(Method::OPTIONS, &url).send().await?;
            let latency = start.elapsed();
            let status = response.status();
            let body = if status == StatusCode::SERVICE_UNAVAILABLE {
                response.text().await?
            } else {
                String::new()
            };
            Ok::<_, reqwest::Error>((latency, status, body))
        };

        let outcome = tokio::time::timeout(self.health_timeout, exchange).await;
        let (latency, status, body) = match outcome {
            Err(_) => {
                return HealthSample::unreachable(format!(
                    "Health probe timed out after {}ms",
                    self.health_timeout.as_millis()
                ))
            }
            Ok(Err(e)) => return HealthSample::unreachable(e.to_string()),
            Ok(Ok(exchange)) => exchange,
        };

        debug!("Health probe: {} in {:?}", status, latency);

        if status == StatusCode::SERVICE_UNAVAILABLE && body.contains(DEVELOPMENT_MARKER) {
            return HealthSample::deployment_unavailable(latency, status.as_u16());
        }

        if status.is_success() {
            HealthSample::reachable(latency, status.as_u16())
        } else {
            HealthSample::unhealthy(latency, status.as_u16())
        }
    }
}

/// Stand-in used when no remote service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTransport;

const UNCONFIGURED: &str = "No remote service configured";

#[async_trait]
impl RemoteTransport for UnconfiguredTransport {
    async fn send_batch(&self, _request: &BatchRequest) -> Result<RemoteBatchReply> {
        Ok(RemoteBatchReply::Unavailable {
            reason: UNCONFIGURED.to_string(),
        })
    }
}

#[async_trait]
impl HealthProbe for UnconfiguredTransport {
    async fn probe(&self) -> HealthSample {
        HealthSample::unreachable(UNCONFIGURED)
    }
}
