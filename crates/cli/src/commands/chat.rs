use serde::Serialize;

use palaver_core::domain::decision::Decision;
use palaver_core::domain::message::Message;
use palaver_core::engine::DecisionEngine;

use crate::commands::{CommandResult, FailureKind};

#[derive(Debug, Serialize)]
struct ChatOutcome {
    command: &'static str,
    status: &'static str,
    decision: Decision,
}

/// One-shot turn through a fully in-memory engine: no database, no CRM, no
/// channel plumbing. Useful for eyeballing classification and replies.
pub fn run(message_text: &str, user: &str, session: Option<String>) -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                FailureKind::RuntimeInit,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let decision = runtime.block_on(async {
        let engine = DecisionEngine::in_memory();
        let mut message = Message::new(message_text, user);
        message.session_id = session;
        engine.handle(&message).await
    });

    let outcome = ChatOutcome { command: "chat", status: "ok", decision };
    match serde_json::to_string_pretty(&outcome) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("chat", FailureKind::Serialization, error.to_string()),
    }
}
