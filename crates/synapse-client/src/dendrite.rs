//! Dendrite client implementation

use crate::error::DendriteError;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use synapse_core::headers::{DENDRITE_IDENTITY, STREAM_CONTENT_TYPE};
use synapse_core::{Identity, ProblemDetails};
use synapse_stream::{
    AbortReason, InboundResponse, StreamError, StreamingSynapse, DEFAULT_IDLE_TIMEOUT,
};
use tracing::{debug, instrument, warn};

/// Dendrite configuration
#[derive(Debug, Clone)]
pub struct DendriteConfig {
    /// Bound on the whole exchange, request through end of stream
    pub timeout: Duration,
    /// Bound on the wait for each response chunk
    pub idle_timeout: Duration,
    /// Identity sent to the axon with every call
    pub identity: Option<Identity>,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,
    /// Max idle connections per host
    pub pool_max_idle_per_host: usize,
}

impl Default for DendriteConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            identity: None,
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
        }
    }
}

/// Result of one exchange: the rebuilt output and the response summary.
#[derive(Debug)]
pub struct Exchange<T> {
    pub output: T,
    pub summary: Value,
}

/// Client for calling synapses on a remote axon
pub struct Dendrite {
    base_url: String,
    client: Client<HttpConnector, Full<Bytes>>,
    config: DendriteConfig,
}

impl Dendrite {
    /// Create a new dendrite targeting `base_url` (e.g. `http://10.0.0.5:8091`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, DendriteConfig::default())
    }

    /// Create a new dendrite with custom configuration
    pub fn with_config(base_url: impl Into<String>, config: DendriteConfig) -> Self {
        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_idle_timeout(config.pool_idle_timeout);
        builder.pool_max_idle_per_host(config.pool_max_idle_per_host);

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: builder.build_http(),
            config,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &DendriteConfig {
        &self.config
    }

    /// Post `synapse` to the axon and process its streamed response.
    ///
    /// The whole exchange is bounded by [`DendriteConfig::timeout`]; each
    /// chunk wait by [`DendriteConfig::idle_timeout`].
    #[instrument(skip(self, synapse), fields(synapse = S::NAME, axon = %self.base_url))]
    pub async fn call<S: StreamingSynapse>(
        &self,
        synapse: &S,
    ) -> Result<Exchange<S::Output>, DendriteError> {
        match tokio::time::timeout(self.config.timeout, self.exchange(synapse)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.config.timeout.as_millis() as u64, "exchange timed out");
                Err(StreamError::Aborted(AbortReason::Timeout(self.config.timeout)).into())
            }
        }
    }

    async fn exchange<S: StreamingSynapse>(
        &self,
        synapse: &S,
    ) -> Result<Exchange<S::Output>, DendriteError> {
        let started = Instant::now();
        let url = format!("{}/{}", self.base_url, S::NAME);
        let body = synapse.encode_request()?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, STREAM_CONTENT_TYPE);
        if let Some(identity) = &self.config.identity {
            builder = builder.header(DENDRITE_IDENTITY, identity.as_str());
        }
        let req = builder
            .body(Full::new(body))
            .map_err(|e| DendriteError::InvalidUrl(format!("{url}: {e}")))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| DendriteError::Transport(format!("Failed to send request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| DendriteError::Transport(format!("Failed to read error response: {e}")))?
                .to_bytes();
            return Err(DendriteError::Status {
                status,
                problem: ProblemDetails::from_slice(&body).ok(),
            });
        }

        let mut response = InboundResponse::new(resp)
            .with_idle_timeout(self.config.idle_timeout)
            .with_started_at(started);
        let output = synapse.process_streaming_response(&mut response).await?;
        let summary = synapse.extract_response_json(&response);

        debug!(
            chunks = response.stats().chunks,
            bytes = response.stats().bytes,
            elapsed_ms = response.elapsed().as_millis() as u64,
            "exchange complete"
        );
        Ok(Exchange { output, summary })
    }
}

impl fmt::Debug for Dendrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dendrite")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_stream::TextStreamSynapse;

    #[test]
    fn test_default_config() {
        let config = DendriteConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert!(config.identity.is_none());
    }

    #[tokio::test]
    async fn test_trailing_slash_trimmed() {
        let dendrite = Dendrite::new("http://127.0.0.1:8091/");
        assert_eq!(dendrite.base_url(), "http://127.0.0.1:8091");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let dendrite = Dendrite::new("not a url");
        let err = dendrite
            .call(&TextStreamSynapse::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DendriteError::InvalidUrl(_)));
    }
}
