use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tutor::TutoringResponse;

/// An answered question kept in the history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique entry identifier
    pub id: String,

    /// The question as asked (empty for image-only questions)
    pub question: String,

    /// Whether an image was attached
    #[serde(default)]
    pub has_image: bool,

    pub response: TutoringResponse,

    /// When the answer was recorded
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(question: impl Into<String>, has_image: bool, response: TutoringResponse) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            has_image,
            response,
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let question = if self.question.is_empty() && self.has_image {
            "[image]"
        } else {
            self.question.as_str()
        };
        // Use chars() to handle UTF-8 safely
        let preview: String = if question.chars().count() > 50 {
            question.chars().take(47).collect::<String>() + "..."
        } else {
            question.to_string()
        };

        let id_short: String = self.id.chars().take(8).collect();

        write!(
            f,
            "{:<10} {:<20} {}",
            id_short,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            preview
        )
    }
}
