pub mod classify;
pub mod config;
pub mod history;
pub mod http;
pub mod llm;
pub mod tutor;

pub use classify::{Classification, ErrorCode, classify};
pub use config::{HistoryConfig, ServerConfig, TutorConfig, UpstreamConfig};
pub use history::{HistoryEntry, HistoryStore, SqliteHistory};
pub use http::{AppState, ErrorBody, HealthResponse, router};
pub use llm::{
    ChatCompletion, ChatRequest, HttpTransport, MessageContent, ResilientExecutor, RetryPolicy,
    Transport, UpstreamFailure, UpstreamResponse,
};
pub use tutor::{
    AskError, AskRequest, NormalizeError, Step, TutorService, TutoringResponse, image_data_url,
    normalize,
};
