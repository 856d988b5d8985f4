use serde::Deserialize;
use serde_json::{json, Value};

use palaver_core::domain::decision::Decision;
use palaver_core::domain::message::{Channel, Message};

use crate::ChannelError;

/// What the Slack events endpoint should do with an inbound payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackInbound {
    /// Echo the challenge back; Slack sends this once when the endpoint is
    /// registered.
    Challenge(String),
    /// A user message worth answering, already mapped into engine terms.
    Message { message: Message, channel_id: String, thread_ts: String },
    /// Bot echoes, edits, and unknown event types. Acknowledged and dropped.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    challenge: Option<String>,
    event: Option<MessageEvent>,
}

#[derive(Debug, Deserialize)]
struct MessageEvent {
    #[serde(rename = "type")]
    kind: String,
    user: Option<String>,
    text: Option<String>,
    channel: Option<String>,
    ts: Option<String>,
    thread_ts: Option<String>,
    bot_id: Option<String>,
    subtype: Option<String>,
}

/// Parse one Slack events-API payload. Unknown shapes are an error; known
/// shapes the bot should not answer resolve to `Ignored`.
pub fn parse_event(body: &Value) -> Result<SlackInbound, ChannelError> {
    let envelope: Envelope = serde_json::from_value(body.clone())
        .map_err(|error| ChannelError::Slack(error.to_string()))?;

    match envelope.kind.as_str() {
        "url_verification" => {
            let challenge = envelope
                .challenge
                .ok_or_else(|| ChannelError::Slack("url_verification without challenge".into()))?;
            Ok(SlackInbound::Challenge(challenge))
        }
        "event_callback" => {
            let Some(event) = envelope.event else {
                return Err(ChannelError::Slack("event_callback without event".into()));
            };
            Ok(map_message_event(event))
        }
        _ => Ok(SlackInbound::Ignored),
    }
}

fn map_message_event(event: MessageEvent) -> SlackInbound {
    if event.kind != "message" {
        return SlackInbound::Ignored;
    }
    // Never answer our own (or any other bot's) messages.
    if event.bot_id.is_some() || event.subtype.as_deref() == Some("bot_message") {
        return SlackInbound::Ignored;
    }

    let (Some(user), Some(text), Some(channel_id), Some(ts)) =
        (event.user, event.text, event.channel, event.ts)
    else {
        return SlackInbound::Ignored;
    };

    // Replies stay in the thread the conversation started in.
    let thread_ts = event.thread_ts.unwrap_or_else(|| ts.clone());
    let mut message = Message::new(text, format!("slack_{user}"))
        .with_session(format!("slack_{channel_id}_{thread_ts}"))
        .with_channel(Channel::Slack);
    message.metadata.insert("slack_channel".to_string(), channel_id.clone());
    message.metadata.insert("slack_ts".to_string(), ts);
    message.metadata.insert("slack_thread_ts".to_string(), thread_ts.clone());

    SlackInbound::Message { message, channel_id, thread_ts }
}

/// Body for `chat.postMessage` answering in the originating thread.
pub fn post_message_payload(channel_id: &str, thread_ts: &str, decision: &Decision) -> Value {
    json!({
        "channel": channel_id,
        "text": decision.response,
        "thread_ts": thread_ts,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_event, post_message_payload, SlackInbound};
    use palaver_core::domain::decision::Decision;
    use palaver_core::domain::intent::Intent;
    use palaver_core::domain::message::Channel;

    #[test]
    fn url_verification_echoes_the_challenge() {
        let payload = json!({"type": "url_verification", "challenge": "abc123"});
        let inbound = parse_event(&payload).expect("parse");
        assert_eq!(inbound, SlackInbound::Challenge("abc123".to_string()));
    }

    #[test]
    fn user_message_maps_to_prefixed_ids() {
        let payload = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "user": "U123",
                "text": "where is my order",
                "channel": "C9",
                "ts": "1710000000.000100"
            }
        });

        let SlackInbound::Message { message, channel_id, thread_ts } =
            parse_event(&payload).expect("parse")
        else {
            panic!("expected a message");
        };

        assert_eq!(message.user_id, "slack_U123");
        assert_eq!(message.session_id.as_deref(), Some("slack_C9_1710000000.000100"));
        assert_eq!(message.channel, Channel::Slack);
        assert_eq!(channel_id, "C9");
        assert_eq!(thread_ts, "1710000000.000100", "root message threads on its own ts");
    }

    #[test]
    fn threaded_reply_keeps_the_original_thread() {
        let payload = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "user": "U123",
                "text": "still waiting",
                "channel": "C9",
                "ts": "1710000099.000200",
                "thread_ts": "1710000000.000100"
            }
        });

        let SlackInbound::Message { message, thread_ts, .. } =
            parse_event(&payload).expect("parse")
        else {
            panic!("expected a message");
        };
        assert_eq!(thread_ts, "1710000000.000100");
        assert_eq!(message.session_id.as_deref(), Some("slack_C9_1710000000.000100"));
    }

    #[test]
    fn bot_messages_are_ignored() {
        let payload = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "bot_id": "B42",
                "text": "I can help you with that",
                "channel": "C9",
                "ts": "1710000000.000300"
            }
        });
        assert_eq!(parse_event(&payload).expect("parse"), SlackInbound::Ignored);

        let payload = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "subtype": "bot_message",
                "user": "U123",
                "text": "echo",
                "channel": "C9",
                "ts": "1710000000.000400"
            }
        });
        assert_eq!(parse_event(&payload).expect("parse"), SlackInbound::Ignored);
    }

    #[test]
    fn non_message_events_are_ignored() {
        let payload = json!({
            "type": "event_callback",
            "event": {"type": "reaction_added", "user": "U123"}
        });
        assert_eq!(parse_event(&payload).expect("parse"), SlackInbound::Ignored);
    }

    #[test]
    fn reply_payload_targets_the_thread() {
        let decision = Decision {
            response: "Your order shipped.".to_string(),
            intent: Intent::OrderInquiry,
            confidence: 0.8,
            requires_escalation: false,
            session_id: "slack_C9_1710000000.000100".to_string(),
            response_time_ms: 4,
        };

        let payload = post_message_payload("C9", "1710000000.000100", &decision);
        assert_eq!(payload["channel"], "C9");
        assert_eq!(payload["thread_ts"], "1710000000.000100");
        assert_eq!(payload["text"], "Your order shipped.");
    }
}
