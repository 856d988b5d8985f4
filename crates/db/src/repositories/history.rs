use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use palaver_core::collab::{HistoryError, HistorySink};
use palaver_core::domain::history::{HistoryEntry, TurnRecord, TurnRole};
use palaver_core::domain::message::Channel;

use super::{ChatHistoryRepository, HistoryQuery, RepositoryError};
use crate::DbPool;

pub struct SqliteChatHistoryRepository {
    pool: DbPool,
}

impl SqliteChatHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatHistoryRepository for SqliteChatHistoryRepository {
    async fn append(&self, entries: Vec<HistoryEntry>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            let metadata = serde_json::to_string(&entry.metadata)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            sqlx::query(
                "INSERT INTO chat_history \
                 (id, user_id, session_id, role, message, response, intent, confidence, channel, timestamp, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )
            .bind(&entry.id)
            .bind(&entry.user_id)
            .bind(&entry.session_id)
            .bind(entry.role.as_str())
            .bind(&entry.message)
            .bind(&entry.response)
            .bind(&entry.intent)
            .bind(entry.confidence)
            .bind(entry.channel.as_str())
            .bind(entry.timestamp)
            .bind(metadata)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn recent(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let limit = query.effective_limit();
        let rows = match &query.session_id {
            Some(session_id) => {
                sqlx::query(
                    "SELECT id, user_id, session_id, role, message, response, intent, confidence, channel, timestamp, metadata \
                     FROM chat_history WHERE user_id = ?1 AND session_id = ?2 \
                     ORDER BY timestamp DESC, rowid DESC LIMIT ?3",
                )
                .bind(&query.user_id)
                .bind(session_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, user_id, session_id, role, message, response, intent, confidence, channel, timestamp, metadata \
                     FROM chat_history WHERE user_id = ?1 \
                     ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
                )
                .bind(&query.user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(decode_row).collect()
    }
}

fn decode_row(row: sqlx::sqlite::SqliteRow) -> Result<HistoryEntry, RepositoryError> {
    let role: String = row.try_get("role")?;
    let role = role.parse::<TurnRole>().map_err(RepositoryError::Decode)?;

    let channel: String = row.try_get("channel")?;
    let channel = channel.parse::<Channel>().map_err(RepositoryError::Decode)?;

    let metadata: String = row.try_get("metadata")?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let timestamp: DateTime<Utc> = row.try_get("timestamp")?;

    Ok(HistoryEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        session_id: row.try_get("session_id")?,
        role,
        message: row.try_get("message")?,
        response: row.try_get("response")?,
        intent: row.try_get("intent")?,
        confidence: row.try_get("confidence")?,
        channel,
        timestamp,
        metadata,
    })
}

/// Split a completed turn into the two rows the log keeps: what the user said
/// and what the bot answered. The bot row carries the classification.
pub fn fan_out(record: TurnRecord) -> Vec<HistoryEntry> {
    let user_entry = HistoryEntry {
        id: Uuid::new_v4().to_string(),
        user_id: record.user_id.clone(),
        session_id: record.session_id.clone(),
        role: TurnRole::User,
        message: record.message.clone(),
        response: String::new(),
        intent: None,
        confidence: None,
        channel: record.channel,
        timestamp: record.timestamp,
        metadata: record.metadata.clone(),
    };
    let bot_entry = HistoryEntry {
        id: Uuid::new_v4().to_string(),
        user_id: record.user_id,
        session_id: record.session_id,
        role: TurnRole::Bot,
        message: String::new(),
        response: record.decision.response,
        intent: Some(record.decision.intent.as_str().to_string()),
        confidence: Some(record.decision.confidence),
        channel: record.channel,
        timestamp: record.timestamp,
        metadata: record.metadata,
    };
    vec![user_entry, bot_entry]
}

#[async_trait]
impl HistorySink for SqliteChatHistoryRepository {
    async fn append(&self, record: TurnRecord) -> Result<(), HistoryError> {
        ChatHistoryRepository::append(self, fan_out(record))
            .await
            .map_err(|error| HistoryError::Append(error.to_string()))
    }
}
