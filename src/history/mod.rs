mod entry;
mod sqlite;
mod storage;

pub use entry::HistoryEntry;
pub use sqlite::SqliteHistory;
pub use storage::HistoryStore;
