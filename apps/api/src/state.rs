use std::sync::Arc;

use crate::chat::hub::ConversationHub;
use crate::chat::stream::MessageStream;
use crate::config::Config;
use crate::matching::scoring::MatchScorer;
use crate::store::{ChatStore, DirectoryStore, RetryPolicy};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn DirectoryStore>,
    pub chat: Arc<dyn ChatStore>,
    /// Local fan-out for live subscriptions. Fed by this process's writes and,
    /// in production, by the Postgres notification relay.
    pub hub: Arc<ConversationHub>,
    /// Pluggable match scorer. Default: WeightedSkillScorer.
    pub scorer: Arc<dyn MatchScorer>,
    pub config: Config,
}

impl AppState {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry_policy()
    }

    pub fn message_stream(&self) -> MessageStream {
        MessageStream::new(
            Arc::clone(&self.chat),
            Arc::clone(&self.hub),
            self.retry_policy(),
            self.config.subscription_buffer,
        )
    }

    /// State backed by a fresh `MemoryStore`, for router tests.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        use crate::matching::scoring::WeightedSkillScorer;
        use crate::store::MemoryStore;

        let store = Arc::new(MemoryStore::new());
        Self {
            directory: store.clone(),
            chat: store,
            hub: Arc::new(ConversationHub::default()),
            scorer: Arc::new(WeightedSkillScorer),
            config: Config {
                database_url: "postgres://unused".to_string(),
                port: 0,
                rust_log: "debug".to_string(),
                db_max_connections: 1,
                store_read_retries: 1,
                store_retry_base_ms: 1,
                subscription_buffer: 4,
            },
        }
    }
}
