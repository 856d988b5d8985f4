//! Channel adapters: translate inbound Slack and WhatsApp payloads into
//! engine messages and engine decisions back into channel replies. Pure
//! translation, no transport; the server owns the HTTP side.

pub mod slack;
pub mod whatsapp;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("malformed slack payload: {0}")]
    Slack(String),
    #[error("malformed whatsapp payload: {0}")]
    Whatsapp(String),
}
