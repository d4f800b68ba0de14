mod failure;
mod message;
mod provider;
mod retry;
mod xai;

pub use failure::UpstreamFailure;
pub use message::{
    AssistantMessage, ChatCompletion, ChatMessage, ChatRequest, Choice, ContentPart, ImageUrl,
    MessageContent, MessageRole,
};
pub use provider::{Transport, UpstreamResponse};
pub use retry::{ResilientExecutor, RetryPolicy};
pub use xai::HttpTransport;
