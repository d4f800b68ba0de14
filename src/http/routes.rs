use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use super::AppState;
use crate::classify::ErrorCode;
use crate::llm::UpstreamFailure;
use crate::tutor::{AskError, AskRequest, TutoringResponse};

type AppStateArc = Arc<AppState>;

/// Error payload returned with every non-2xx response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// All routes with CORS and request tracing applied
pub fn router(state: AppStateArc) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/ask", post(ask))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

async fn ask(
    State(state): State<AppStateArc>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<TutoringResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "rejected ask payload");
        ApiError::from(AskError::MissingInput).with_details(rejection.body_text())
    })?;

    let response = state.service.ask(&request).await?;

    if let Some(history) = &state.history {
        let question = request.question().unwrap_or_default();
        if let Err(e) = history
            .add(question, request.image().is_some(), &response)
            .await
        {
            warn!(error = %e, "failed to record history entry");
        }
    }

    Ok(Json(response))
}

/// A classified failure with its HTTP status
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }
}

impl From<AskError> for ApiError {
    fn from(err: AskError) -> Self {
        let status = match &err {
            AskError::MissingInput => StatusCode::BAD_REQUEST,
            AskError::Upstream(UpstreamFailure::HttpStatus { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AskError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            AskError::MalformedReply(_) | AskError::EmptyResponse | AskError::Normalize(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let classification = err.classification();

        if status.is_server_error() {
            error!(status = status.as_u16(), code = %classification.code, error = %err, "ask failed");
        } else {
            warn!(status = status.as_u16(), code = %classification.code, error = %err, "ask failed");
        }

        Self {
            status,
            body: ErrorBody {
                error: classification.message.to_string(),
                code: classification.code,
                retryable: classification.retryable,
                details: err.details().map(str::to_string),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
