use async_trait::async_trait;
use thiserror::Error;

use palaver_core::domain::history::HistoryEntry;

pub mod history;
pub mod memory;

pub use history::SqliteChatHistoryRepository;
pub use memory::InMemoryChatHistoryRepository;

/// Default page size for history reads when the caller does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Hard ceiling on a single history read.
pub const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Parameters for a history read. The limit is clamped, never trusted.
#[derive(Clone, Debug)]
pub struct HistoryQuery {
    pub user_id: String,
    pub session_id: Option<String>,
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), session_id: None, limit: None }
    }

    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            None | Some(0) => DEFAULT_HISTORY_LIMIT,
            Some(limit) => limit.min(MAX_HISTORY_LIMIT),
        }
    }
}

#[async_trait]
pub trait ChatHistoryRepository: Send + Sync {
    async fn append(&self, entries: Vec<HistoryEntry>) -> Result<(), RepositoryError>;

    /// Most recent entries first.
    async fn recent(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, RepositoryError>;
}
