use async_trait::async_trait;

use super::{ChatRequest, UpstreamFailure};

/// Status and body of one upstream HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Rate limiting and server errors are worth another attempt
    pub fn is_transient(&self) -> bool {
        self.status == 429 || self.status >= 500
    }

    /// Body of a successful response, or the terminal status as a failure
    pub fn into_success(self) -> Result<String, UpstreamFailure> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(UpstreamFailure::HttpStatus {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Sends a single chat request to the upstream model API.
///
/// One call is one attempt: implementations neither retry nor enforce a
/// deadline, both belong to [`super::ResilientExecutor`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request and read the full response body
    async fn send(&self, request: &ChatRequest) -> Result<UpstreamResponse, UpstreamFailure>;

    /// Get the transport name
    fn name(&self) -> &str;
}
