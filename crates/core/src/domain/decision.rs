use serde::{Deserialize, Serialize};

use super::intent::Intent;

/// The engine's structured verdict for one inbound message.
///
/// Immutable and returned exactly once per turn. `requires_escalation == true`
/// always coincides with `intent == Escalate` or a sub-threshold confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub response: String,
    pub intent: Intent,
    pub confidence: f64,
    pub requires_escalation: bool,
    pub session_id: String,
    pub response_time_ms: u64,
}
