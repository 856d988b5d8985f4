use serde::{Deserialize, Serialize};

use crate::domain::context::ConversationContext;
use crate::domain::intent::{ClassificationResult, Intent};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Confidence below this hands the conversation to a human.
    pub confidence_threshold: f64,
    /// Consecutive same-intent turns that count as "stuck".
    pub repeat_turn_threshold: u32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self { confidence_threshold: 0.7, repeat_turn_threshold: 3 }
    }
}

/// Why a turn was escalated. Logged alongside the decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscalationReason {
    ExplicitRequest,
    LowConfidence,
    RepeatedUnresolvedIntent,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitRequest => "explicit_request",
            Self::LowConfidence => "low_confidence",
            Self::RepeatedUnresolvedIntent => "repeated_unresolved_intent",
        }
    }
}

/// Pure, deterministic escalation rules. Evaluated in order; first match wins.
#[derive(Clone, Debug, Default)]
pub struct EscalationPolicy {
    config: EscalationConfig,
}

impl EscalationPolicy {
    pub fn new(config: EscalationConfig) -> Self {
        Self { config }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.config.confidence_threshold
    }

    /// `history_len` is the number of turns already recorded for this
    /// conversation, including the current one.
    pub fn should_escalate(
        &self,
        result: &ClassificationResult,
        context: &ConversationContext,
        history_len: u32,
    ) -> Option<EscalationReason> {
        if result.intent == Intent::Escalate {
            return Some(EscalationReason::ExplicitRequest);
        }

        if result.confidence < self.config.confidence_threshold {
            return Some(EscalationReason::LowConfidence);
        }

        let repeats_current_intent = context.last_intent == Some(result.intent);
        if repeats_current_intent
            && context.repeat_count() >= self.config.repeat_turn_threshold
            && history_len >= self.config.repeat_turn_threshold
        {
            return Some(EscalationReason::RepeatedUnresolvedIntent);
        }

        None
    }
}
