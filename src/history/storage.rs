use anyhow::Result;
use async_trait::async_trait;

use super::HistoryEntry;
use crate::tutor::TutoringResponse;

/// Capped, most-recent-first log of answered questions
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record an answer at the front, dropping the oldest entries over capacity
    async fn add(
        &self,
        question: &str,
        has_image: bool,
        response: &TutoringResponse,
    ) -> Result<HistoryEntry>;

    /// All entries, newest first
    async fn list(&self) -> Result<Vec<HistoryEntry>>;

    /// Load an entry by ID
    async fn get(&self, id: &str) -> Result<Option<HistoryEntry>>;

    /// Remove an entry, returning whether it existed
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Remove every entry
    async fn clear(&self) -> Result<()>;
}
