use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of an outbound chat-completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model variant to run
    pub model: String,
    /// System prompt followed by the user turn
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Build a two-message request: fixed system prompt, then the user turn
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        user: MessageContent,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage {
                    role: MessageRole::System,
                    content: MessageContent::Text(system.into()),
                },
                ChatMessage {
                    role: MessageRole::User,
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Message content: plain text, or a part list when an image is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text part followed by an inline image given as a data URL
    pub fn text_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self::Parts(vec![
            ContentPart::Text { text: text.into() },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image_url.into(),
                },
            },
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Base64 data URL, e.g. `data:image/jpeg;base64,...`
    pub url: String,
}

/// The subset of a chat-completion reply the tutor reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Absent when the choice was cut off before any message
    #[serde(default)]
    pub message: Option<AssistantMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    /// Kept loose; anything but a string counts as no content
    #[serde(default)]
    pub content: Option<Value>,
}

impl ChatCompletion {
    /// Text content of the first choice, if present and not blank
    pub fn content(&self) -> Option<&str> {
        let message = self.choices.first()?.message.as_ref()?;
        match &message.content {
            Some(Value::String(content)) if !content.trim().is_empty() => Some(content),
            _ => None,
        }
    }
}
