use std::time::Duration;

/// Why a call to the upstream model API did not produce a usable response.
///
/// Produced at the point of failure so callers can classify it without
/// inspecting error messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamFailure {
    /// An attempt did not complete within the per-attempt timeout
    #[error("upstream request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The upstream answered with a non-success status
    #[error("upstream returned HTTP {status}")]
    HttpStatus { status: u16, body: String },

    /// Connection, DNS, TLS or body-read failure
    #[error("transport fault: {0}")]
    Transport(String),
}

impl UpstreamFailure {
    /// Status code carried by an `HttpStatus` failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured limit on the error
            Self::Timeout(Duration::ZERO)
        } else {
            Self::Transport(err.to_string())
        }
    }
}
