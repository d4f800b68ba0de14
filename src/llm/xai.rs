use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{ChatRequest, Transport, UpstreamFailure, UpstreamResponse};

/// Chat-completion transport for xAI and other OpenAI-compatible endpoints
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint` with a bearer token
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("step-tutor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Create a transport reading the API key from `key_var`
    pub fn from_env(endpoint: impl Into<String>, key_var: &str) -> Result<Self> {
        let api_key = std::env::var(key_var)
            .with_context(|| format!("{} environment variable not set", key_var))?;
        Self::new(endpoint, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: &ChatRequest) -> Result<UpstreamResponse, UpstreamFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "upstream responded");

        Ok(UpstreamResponse { status, body })
    }
}
