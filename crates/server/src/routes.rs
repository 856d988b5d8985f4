use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use palaver_core::domain::decision::Decision;
use palaver_core::domain::history::HistoryEntry;
use palaver_core::domain::message::{Channel, Message};
use palaver_core::engine::DecisionEngine;
use palaver_core::InterfaceError;
use palaver_db::repositories::{ChatHistoryRepository, HistoryQuery};
use palaver_db::DbPool;

use crate::webhooks;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub history: Arc<dyn ChatHistoryRepository>,
    pub db_pool: DbPool,
    pub slack_bot_token: Option<secrecy::SecretString>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/history/{user_id}", get(history))
        .route("/health", get(health))
        .route("/webhooks/slack", post(webhooks::slack))
        .route("/webhooks/whatsapp", post(webhooks::whatsapp))
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(event_name = "http.request_failed", error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.user_message() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Decision>, ApiError> {
    if request.user_id.trim().is_empty() {
        return Err(InterfaceError::bad_request("user_id must not be empty").into());
    }
    let channel = match request.channel.as_deref() {
        Some(raw) => Channel::from_str(raw).map_err(InterfaceError::bad_request)?,
        None => Channel::Web,
    };

    let mut message = Message::new(request.message, request.user_id).with_channel(channel);
    message.session_id = request.session_id;

    Ok(Json(state.engine.handle(&message).await))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub count: usize,
    pub entries: Vec<HistoryEntry>,
}

pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    if user_id.trim().is_empty() {
        return Err(InterfaceError::bad_request("user_id must not be empty").into());
    }

    let query = HistoryQuery { user_id: user_id.clone(), session_id: params.session_id, limit: params.limit };
    let entries = state
        .history
        .recent(&query)
        .await
        .map_err(|error| InterfaceError::unavailable(error.to_string()))?;

    Ok(Json(HistoryResponse { user_id, count: entries.len(), entries }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: BTreeMap<&'static str, String>,
    pub checked_at: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => "ready".to_string(),
        Err(error) => format!("degraded: {error}"),
    };
    let ready = database == "ready";

    let mut services = BTreeMap::new();
    services.insert("engine", "ready".to_string());
    services.insert("database", database);
    services.insert(
        "slack",
        if state.slack_bot_token.is_some() { "configured" } else { "not_configured" }.to_string(),
    );

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        services,
        checked_at: Utc::now().to_rfc3339(),
    };
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::Json;

    use palaver_core::config::{ConfigOverrides, LoadOptions};
    use palaver_core::domain::intent::Intent;

    use super::{chat, health, history, AppState, ChatRequest, HistoryParams};
    use crate::bootstrap::bootstrap;

    async fn state(db_name: &str) -> AppState {
        // Named shared-memory database keeps the schema visible to every pool
        // connection while isolating tests from each other.
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(format!("sqlite:file:{db_name}?mode=memory&cache=shared")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap");
        AppState {
            engine: app.engine.clone(),
            history: app.history.clone(),
            db_pool: app.db_pool.clone(),
            slack_bot_token: None,
        }
    }

    #[tokio::test]
    async fn chat_answers_an_order_question() {
        let request = ChatRequest {
            message: "I need help with my order #12345".to_string(),
            user_id: "user-1".to_string(),
            session_id: Some("s-1".to_string()),
            channel: None,
        };

        let Json(decision) = chat(State(state("routes_chat").await), Json(request)).await.expect("chat");
        assert_eq!(decision.intent, Intent::OrderInquiry);
        assert_eq!(decision.session_id, "s-1");
        assert!(!decision.requires_escalation);
    }

    #[tokio::test]
    async fn chat_rejects_a_blank_user_id() {
        let request = ChatRequest {
            message: "hello".to_string(),
            user_id: "  ".to_string(),
            session_id: None,
            channel: None,
        };
        assert!(chat(State(state("routes_blank_user").await), Json(request)).await.is_err());
    }

    #[tokio::test]
    async fn chat_rejects_an_unknown_channel() {
        let request = ChatRequest {
            message: "hello".to_string(),
            user_id: "user-1".to_string(),
            session_id: None,
            channel: Some("carrier-pigeon".to_string()),
        };
        assert!(chat(State(state("routes_bad_channel").await), Json(request)).await.is_err());
    }

    #[tokio::test]
    async fn history_returns_persisted_turns() {
        let state = state("routes_history").await;
        let request = ChatRequest {
            message: "i want a refund".to_string(),
            user_id: "user-1".to_string(),
            session_id: Some("s-1".to_string()),
            channel: None,
        };
        chat(State(state.clone()), Json(request)).await.expect("chat");

        // History appends are spawned; poll until they land.
        let mut entries = Vec::new();
        for _ in 0..50 {
            let Json(response) = history(
                State(state.clone()),
                Path("user-1".to_string()),
                Query(HistoryParams { session_id: None, limit: None }),
            )
            .await
            .expect("history");
            if response.count == 2 {
                entries = response.entries;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(entries.len(), 2, "one user row and one bot row");
    }

    #[tokio::test]
    async fn health_reports_ready_with_a_live_database() {
        let state = state("routes_health").await;
        let (status, Json(payload)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.services.get("database").map(String::as_str), Some("ready"));
    }
}
