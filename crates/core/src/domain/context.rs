use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::intent::Intent;

/// Slot key under which the consecutive same-intent turn counter is carried.
pub const REPEAT_COUNT_SLOT: &str = "repeat_count";

/// Slot key counting all turns recorded since the context was (re)created.
pub const TURN_COUNT_SLOT: &str = "turn_count";

/// Slot key for the most recently mentioned order number.
pub const ORDER_NUMBER_SLOT: &str = "order_number";

/// Slot key for a CRM customer id resolved earlier in the conversation.
pub const CUSTOMER_ID_SLOT: &str = "customer_id";

/// Short-lived per-user conversation state.
///
/// Exactly one live record exists per user; the engine overwrites it on every
/// turn and entries idle past the store TTL are treated as absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub user_id: String,
    pub last_intent: Option<Intent>,
    pub open_topic: Option<String>,
    pub pending_slots: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            last_intent: None,
            open_topic: None,
            pending_slots: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Consecutive turns the current intent has been repeated, including the
    /// turn that set it. Zero when no intent has been recorded yet.
    pub fn repeat_count(&self) -> u32 {
        self.pending_slots
            .get(REPEAT_COUNT_SLOT)
            .and_then(|raw| raw.parse::<u32>().ok())
            .unwrap_or(0)
    }

    /// Total turns recorded against this context since it was (re)created.
    pub fn turn_count(&self) -> u32 {
        self.pending_slots
            .get(TURN_COUNT_SLOT)
            .and_then(|raw| raw.parse::<u32>().ok())
            .unwrap_or(0)
    }

    /// Record a classified turn: bumps the repeat counter when the intent
    /// matches the previous turn, resets it otherwise.
    pub fn record_turn(&mut self, intent: Intent, now: DateTime<Utc>) {
        let repeats =
            if self.last_intent == Some(intent) { self.repeat_count().saturating_add(1) } else { 1 };
        self.pending_slots.insert(REPEAT_COUNT_SLOT.to_string(), repeats.to_string());
        self.pending_slots
            .insert(TURN_COUNT_SLOT.to_string(), self.turn_count().saturating_add(1).to_string());
        self.last_intent = Some(intent);
        self.updated_at = now;
    }

    pub fn set_slot(&mut self, key: &str, value: impl Into<String>) {
        self.pending_slots.insert(key.to_string(), value.into());
    }

    pub fn slot(&self, key: &str) -> Option<&str> {
        self.pending_slots.get(key).map(String::as_str)
    }
}
