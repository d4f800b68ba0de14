use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::normalize::{NormalizeError, normalize};
use super::prompt::{DEFAULT_IMAGE_QUESTION, SYSTEM_PROMPT};
use super::TutoringResponse;
use crate::classify::{Classification, ErrorCode, classify};
use crate::config::UpstreamConfig;
use crate::llm::{ChatCompletion, ChatRequest, MessageContent, ResilientExecutor, UpstreamFailure};

/// A question from the client: text, an image data URL, or both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    /// Base64 data URL, e.g. `data:image/jpeg;base64,...`
    #[serde(default)]
    pub image: Option<String>,
}

impl AskRequest {
    pub fn text(question: impl Into<String>) -> Self {
        Self {
            question: Some(question.into()),
            image: None,
        }
    }

    /// Question text, if not blank
    pub fn question(&self) -> Option<&str> {
        self.question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// Image data URL, if not blank
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().map(str::trim).filter(|i| !i.is_empty())
    }
}

/// Why a question did not produce a tutoring response
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("question or image is required")]
    MissingInput,

    #[error(transparent)]
    Upstream(#[from] UpstreamFailure),

    #[error("upstream reply is not a chat completion: {0}")]
    MalformedReply(String),

    #[error("upstream returned no content")]
    EmptyResponse,

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl AskError {
    pub fn classification(&self) -> Classification {
        match self {
            Self::MissingInput => ErrorCode::ValidationError.into(),
            Self::Upstream(failure) => classify(failure),
            Self::MalformedReply(_) => ErrorCode::UnknownError.into(),
            Self::EmptyResponse => ErrorCode::EmptyResponse.into(),
            Self::Normalize(NormalizeError::Parse { .. }) => ErrorCode::ParseError.into(),
            Self::Normalize(NormalizeError::InvalidStructure { .. }) => {
                ErrorCode::InvalidStructure.into()
            }
        }
    }

    /// Upstream error body, passed on to the client
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Upstream(UpstreamFailure::HttpStatus { body, .. }) => Some(body),
            _ => None,
        }
    }
}

/// Answers questions through the upstream model
#[derive(Clone)]
pub struct TutorService {
    executor: ResilientExecutor,
    upstream: UpstreamConfig,
}

impl TutorService {
    pub fn new(executor: ResilientExecutor, upstream: UpstreamConfig) -> Self {
        Self { executor, upstream }
    }

    /// Build the chat request, picking the vision model when an image is attached
    pub fn build_request(&self, ask: &AskRequest) -> Result<ChatRequest, AskError> {
        let (model, content) = match (ask.question(), ask.image()) {
            (None, None) => return Err(AskError::MissingInput),
            (question, Some(image)) => (
                &self.upstream.vision_model,
                MessageContent::text_with_image(question.unwrap_or(DEFAULT_IMAGE_QUESTION), image),
            ),
            (Some(question), None) => (
                &self.upstream.text_model,
                MessageContent::Text(question.to_string()),
            ),
        };

        Ok(ChatRequest::new(
            model.as_str(),
            SYSTEM_PROMPT,
            content,
            self.upstream.temperature,
            self.upstream.max_tokens,
        ))
    }

    /// Ask the model and normalize its reply
    pub async fn ask(&self, ask: &AskRequest) -> Result<TutoringResponse, AskError> {
        let request = self.build_request(ask)?;
        info!(
            model = %request.model,
            has_image = ask.image().is_some(),
            "asking model"
        );

        let body = self.executor.execute(&request).await?.into_success()?;

        let completion: ChatCompletion =
            serde_json::from_str(&body).map_err(|e| AskError::MalformedReply(e.to_string()))?;
        let content = completion.content().ok_or(AskError::EmptyResponse)?;

        let response = normalize(content).inspect_err(|e| {
            warn!(error = %e, raw = e.raw(), "failed to normalize model reply");
        })?;

        info!(steps = response.steps.len(), "model reply normalized");
        Ok(response)
    }
}
