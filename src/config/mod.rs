mod settings;

pub use settings::{HistoryConfig, ServerConfig, TutorConfig, UpstreamConfig};
