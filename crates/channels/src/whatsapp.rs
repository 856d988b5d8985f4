use serde::Deserialize;

use palaver_core::domain::decision::Decision;
use palaver_core::domain::message::{Channel, Message};

use crate::ChannelError;

/// Twilio's inbound WhatsApp webhook form fields, the subset we use.
#[derive(Debug, Deserialize)]
pub struct TwilioInbound {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: Option<String>,
}

/// Map a Twilio webhook into an engine message. The sender's number becomes a
/// stable `whatsapp_`-prefixed user id; each number is one rolling session.
pub fn to_message(inbound: &TwilioInbound) -> Result<Message, ChannelError> {
    let number = inbound.from.strip_prefix("whatsapp:").unwrap_or(&inbound.from).trim();
    if number.is_empty() {
        return Err(ChannelError::Whatsapp("missing From number".to_string()));
    }

    let user_id = format!("whatsapp_{number}");
    let mut message = Message::new(inbound.body.clone(), user_id.clone())
        .with_session(user_id)
        .with_channel(Channel::Whatsapp);
    if let Some(sid) = &inbound.message_sid {
        message.metadata.insert("message_sid".to_string(), sid.clone());
    }
    if let Some(to) = &inbound.to {
        message.metadata.insert("to".to_string(), to.clone());
    }
    Ok(message)
}

/// TwiML reply body; Twilio sends it back to the user on our behalf.
pub fn twiml_reply(decision: &Decision) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(&decision.response)
    )
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{to_message, twiml_reply, TwilioInbound};
    use palaver_core::domain::decision::Decision;
    use palaver_core::domain::intent::Intent;
    use palaver_core::domain::message::Channel;

    fn inbound(from: &str, body: &str) -> TwilioInbound {
        TwilioInbound {
            from: from.to_string(),
            to: Some("whatsapp:+15550000000".to_string()),
            body: body.to_string(),
            message_sid: Some("SM123".to_string()),
        }
    }

    #[test]
    fn sender_number_becomes_the_user_and_session_id() {
        let message = to_message(&inbound("whatsapp:+15551234567", "hi")).expect("map");
        assert_eq!(message.user_id, "whatsapp_+15551234567");
        assert_eq!(message.session_id.as_deref(), Some("whatsapp_+15551234567"));
        assert_eq!(message.channel, Channel::Whatsapp);
        assert_eq!(message.metadata.get("message_sid").map(String::as_str), Some("SM123"));
    }

    #[test]
    fn missing_sender_is_rejected() {
        assert!(to_message(&inbound("whatsapp:", "hi")).is_err());
    }

    #[test]
    fn twiml_reply_escapes_markup() {
        let decision = Decision {
            response: "Use <Settings> & retry".to_string(),
            intent: Intent::TechnicalSupport,
            confidence: 0.9,
            requires_escalation: false,
            session_id: "s-1".to_string(),
            response_time_ms: 3,
        };

        let twiml = twiml_reply(&decision);
        assert!(twiml.starts_with("<?xml"));
        assert!(twiml.contains("Use &lt;Settings&gt; &amp; retry"));
        assert!(twiml.contains("<Response><Message>"));
    }
}
