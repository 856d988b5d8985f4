pub mod chat;
pub mod config;
pub mod doctor;
pub mod migrate;

use serde::Serialize;

/// Failure classes shared across the operator commands. Exit codes start at
/// 10 so shell wrappers can tell a palaver failure from clap's own usage
/// errors (exit 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Serialization,
    RuntimeInit,
    ConfigValidation,
    DbConnectivity,
    Migration,
}

impl FailureKind {
    pub fn exit_code(self) -> u8 {
        match self {
            FailureKind::Serialization => 10,
            FailureKind::RuntimeInit => 11,
            FailureKind::ConfigValidation => 12,
            FailureKind::DbConnectivity => 13,
            FailureKind::Migration => 14,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &'static str, message: impl Into<String>) -> Self {
        let outcome =
            CommandOutcome { command, status: "ok", failure: None, message: message.into() };
        Self { exit_code: 0, output: render_outcome(outcome) }
    }

    pub fn failure(command: &'static str, kind: FailureKind, message: impl Into<String>) -> Self {
        let outcome =
            CommandOutcome { command, status: "error", failure: Some(kind), message: message.into() };
        Self { exit_code: kind.exit_code(), output: render_outcome(outcome) }
    }
}

fn render_outcome(outcome: CommandOutcome) -> String {
    serde_json::to_string(&outcome).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\"failure\":\"serialization\",\"message\":\"{}\"}}",
            outcome.command,
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{CommandResult, FailureKind};

    #[test]
    fn failure_outcomes_carry_the_kind_and_a_reserved_exit_code() {
        let result =
            CommandResult::failure("migrate", FailureKind::DbConnectivity, "no database");
        assert_eq!(result.exit_code, 13);

        let payload: Value = serde_json::from_str(&result.output).expect("json outcome");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["failure"], "db_connectivity");
    }

    #[test]
    fn success_outcomes_omit_the_failure_field() {
        let result = CommandResult::success("migrate", "applied pending migrations");
        assert_eq!(result.exit_code, 0);

        let payload: Value = serde_json::from_str(&result.output).expect("json outcome");
        assert_eq!(payload["status"], "ok");
        assert!(payload.get("failure").is_none());
    }

    #[test]
    fn every_failure_kind_maps_above_the_clap_usage_codes() {
        let kinds = [
            FailureKind::Serialization,
            FailureKind::RuntimeInit,
            FailureKind::ConfigValidation,
            FailureKind::DbConnectivity,
            FailureKind::Migration,
        ];
        for kind in kinds {
            assert!(kind.exit_code() >= 10, "{kind:?} collides with reserved exit codes");
        }
    }
}
