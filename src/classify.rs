//! User-facing failure categories.
//!
//! Every failure a request can end in maps to exactly one [`ErrorCode`],
//! which fixes the message shown to the user and whether resubmitting the
//! same question is worth a try.

use serde::{Deserialize, Serialize};

use crate::llm::UpstreamFailure;

/// Serialized and displayed by its wire name, see [`ErrorCode::as_str`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum ErrorCode {
    ValidationError,
    Timeout,
    RateLimit,
    AuthError,
    ServerError,
    NetworkError,
    UnknownError,
    EmptyResponse,
    ParseError,
    InvalidStructure,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 10] = [
        Self::ValidationError,
        Self::Timeout,
        Self::RateLimit,
        Self::AuthError,
        Self::ServerError,
        Self::NetworkError,
        Self::UnknownError,
        Self::EmptyResponse,
        Self::ParseError,
        Self::InvalidStructure,
    ];

    /// Wire name, e.g. `RATE_LIMIT`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::RateLimit => "RATE_LIMIT",
            Self::AuthError => "AUTH_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::ParseError => "PARSE_ERROR",
            Self::InvalidStructure => "INVALID_STRUCTURE",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::ValidationError => "Question or image is required.",
            Self::Timeout => "The request took too long. The AI might be busy - please try again.",
            Self::RateLimit => "Too many requests. Please wait a moment before trying again.",
            Self::AuthError => "Authentication error. Please contact support.",
            Self::ServerError => {
                "The AI service is temporarily unavailable. Please try again in a moment."
            }
            Self::NetworkError => "Network error. Please check your internet connection.",
            Self::UnknownError => "Something went wrong. Please try again.",
            Self::EmptyResponse => "The AI returned an empty response. Please try again.",
            Self::ParseError => {
                "The AI response was not in the expected format. Please try asking again."
            }
            Self::InvalidStructure => "The AI response was incomplete. Please try asking again.",
        }
    }

    pub fn retryable(self) -> bool {
        !matches!(self, Self::ValidationError | Self::AuthError)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorCode> for &'static str {
    fn from(code: ErrorCode) -> Self {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == name)
            .ok_or_else(|| format!("unknown error code: {}", name))
    }
}

/// A classified failure, ready to show to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub code: ErrorCode,
    pub message: &'static str,
    pub retryable: bool,
}

impl From<ErrorCode> for Classification {
    fn from(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.message(),
            retryable: code.retryable(),
        }
    }
}

/// Map an upstream failure to its category
pub fn classify(failure: &UpstreamFailure) -> Classification {
    let code = match failure {
        UpstreamFailure::Timeout(_) => ErrorCode::Timeout,
        UpstreamFailure::HttpStatus { status: 429, .. } => ErrorCode::RateLimit,
        UpstreamFailure::HttpStatus {
            status: 401 | 403, ..
        } => ErrorCode::AuthError,
        UpstreamFailure::HttpStatus { status, .. } if *status >= 500 => ErrorCode::ServerError,
        UpstreamFailure::HttpStatus { .. } => ErrorCode::UnknownError,
        UpstreamFailure::Transport(_) => ErrorCode::NetworkError,
    };
    code.into()
}
