use std::collections::BTreeMap;

use chrono::{Duration, Utc};

use palaver_core::collab::HistorySink;
use palaver_core::domain::decision::Decision;
use palaver_core::domain::history::{HistoryEntry, TurnRecord, TurnRole};
use palaver_core::domain::intent::Intent;
use palaver_core::domain::message::Channel;
use palaver_core::config::DatabaseConfig;
use palaver_db::migrations::run_pending;
use palaver_db::{connect, ChatHistoryRepository, HistoryQuery, SqliteChatHistoryRepository};

async fn repository() -> SqliteChatHistoryRepository {
    let database = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        timeout_secs: 30,
    };
    let pool = connect(&database).await.expect("connect");
    run_pending(&pool).await.expect("migrations");
    SqliteChatHistoryRepository::new(pool)
}

fn entry(user_id: &str, session_id: &str, message: &str, age_secs: i64) -> HistoryEntry {
    HistoryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        session_id: session_id.to_string(),
        role: TurnRole::User,
        message: message.to_string(),
        response: String::new(),
        intent: None,
        confidence: None,
        channel: Channel::Web,
        timestamp: Utc::now() - Duration::seconds(age_secs),
        metadata: BTreeMap::new(),
    }
}

#[tokio::test]
async fn recent_returns_newest_first_scoped_to_the_user() {
    let repo = repository().await;
    ChatHistoryRepository::append(&repo, vec![
        entry("user-1", "s-1", "oldest", 30),
        entry("user-1", "s-1", "middle", 20),
        entry("user-2", "s-9", "other user", 15),
        entry("user-1", "s-1", "newest", 10),
    ])
    .await
    .expect("append");

    let entries = repo.recent(&HistoryQuery::for_user("user-1")).await.expect("recent");
    let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, ["newest", "middle", "oldest"]);
}

#[tokio::test]
async fn recent_filters_by_session_and_clamps_the_limit() {
    let repo = repository().await;
    let mut entries = Vec::new();
    for index in 0..120 {
        entries.push(entry("user-1", "s-1", &format!("turn {index}"), 1000 - index));
    }
    entries.push(entry("user-1", "s-2", "other session", 0));
    ChatHistoryRepository::append(&repo, entries).await.expect("append");

    let query = HistoryQuery {
        user_id: "user-1".to_string(),
        session_id: Some("s-1".to_string()),
        limit: Some(500),
    };
    let scoped = repo.recent(&query).await.expect("recent");
    assert_eq!(scoped.len(), 100, "limit clamps to the ceiling");
    assert!(scoped.iter().all(|entry| entry.session_id == "s-1"));

    let default_query = HistoryQuery::for_user("user-1");
    let defaulted = repo.recent(&default_query).await.expect("recent");
    assert_eq!(defaulted.len(), 50, "default page size");
}

#[tokio::test]
async fn sink_fans_a_turn_into_user_and_bot_rows() {
    let repo = repository().await;
    let record = TurnRecord {
        user_id: "user-1".to_string(),
        session_id: "s-1".to_string(),
        channel: Channel::Slack,
        message: "where is my order #12345".to_string(),
        decision: Decision {
            response: "Your order is on the way.".to_string(),
            intent: Intent::OrderInquiry,
            confidence: 0.8,
            requires_escalation: false,
            session_id: "s-1".to_string(),
            response_time_ms: 12,
        },
        metadata: BTreeMap::new(),
        timestamp: Utc::now(),
    };

    HistorySink::append(&repo, record).await.expect("sink append");

    let entries = repo.recent(&HistoryQuery::for_user("user-1")).await.expect("recent");
    assert_eq!(entries.len(), 2);

    let user_row = entries.iter().find(|e| e.role == TurnRole::User).expect("user row");
    assert_eq!(user_row.message, "where is my order #12345");
    assert_eq!(user_row.intent, None);

    let bot_row = entries.iter().find(|e| e.role == TurnRole::Bot).expect("bot row");
    assert_eq!(bot_row.response, "Your order is on the way.");
    assert_eq!(bot_row.intent.as_deref(), Some("order_inquiry"));
    assert_eq!(bot_row.confidence, Some(0.8));
    assert_eq!(bot_row.channel, Channel::Slack);
}

#[tokio::test]
async fn round_trip_preserves_metadata_and_channel() {
    let repo = repository().await;
    let mut metadata = BTreeMap::new();
    metadata.insert("thread_ts".to_string(), "1710000000.000100".to_string());
    let mut seeded = entry("user-1", "s-1", "hello", 0);
    seeded.channel = Channel::Whatsapp;
    seeded.metadata = metadata.clone();
    ChatHistoryRepository::append(&repo, vec![seeded]).await.expect("append");

    let entries = repo.recent(&HistoryQuery::for_user("user-1")).await.expect("recent");
    assert_eq!(entries[0].channel, Channel::Whatsapp);
    assert_eq!(entries[0].metadata, metadata);
}
