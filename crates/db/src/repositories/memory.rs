use async_trait::async_trait;
use tokio::sync::RwLock;

use palaver_core::collab::{HistoryError, HistorySink};
use palaver_core::domain::history::{HistoryEntry, TurnRecord};

use super::history::fan_out;
use super::{ChatHistoryRepository, HistoryQuery, RepositoryError};

/// In-memory history log for tests and the one-shot CLI.
#[derive(Default)]
pub struct InMemoryChatHistoryRepository {
    entries: RwLock<Vec<HistoryEntry>>,
}

#[async_trait]
impl ChatHistoryRepository for InMemoryChatHistoryRepository {
    async fn append(&self, new_entries: Vec<HistoryEntry>) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.extend(new_entries);
        Ok(())
    }

    async fn recent(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<HistoryEntry> = entries
            .iter()
            .filter(|entry| entry.user_id == query.user_id)
            .filter(|entry| {
                query.session_id.as_deref().map(|s| entry.session_id == s).unwrap_or(true)
            })
            .cloned()
            .collect();
        matching.reverse();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(query.effective_limit() as usize);
        Ok(matching)
    }
}

#[async_trait]
impl HistorySink for InMemoryChatHistoryRepository {
    async fn append(&self, record: TurnRecord) -> Result<(), HistoryError> {
        ChatHistoryRepository::append(self, fan_out(record))
            .await
            .map_err(|error| HistoryError::Append(error.to_string()))
    }
}
