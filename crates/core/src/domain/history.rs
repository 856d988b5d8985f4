use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::Decision;
use super::message::Channel;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Bot,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl std::str::FromStr for TurnRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            other => Err(format!("unknown turn role `{other}`")),
        }
    }
}

/// One persisted chat turn, either side of the conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub role: TurnRole,
    pub message: String,
    pub response: String,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub channel: Channel,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A completed turn handed to the history collaborator. The sink fans this out
/// into a user entry and a bot entry.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnRecord {
    pub user_id: String,
    pub session_id: String,
    pub channel: Channel,
    pub message: String,
    pub decision: Decision,
    pub metadata: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}
