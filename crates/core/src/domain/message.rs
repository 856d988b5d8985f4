use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Delivery channel an inbound message arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Web,
    Slack,
    Whatsapp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Slack => "slack",
            Self::Whatsapp => "whatsapp",
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::Web
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "slack" => Ok(Self::Slack),
            "whatsapp" => Ok(Self::Whatsapp),
            other => Err(format!("unsupported channel `{other}` (expected web|slack|whatsapp)")),
        }
    }
}

/// An inbound customer message. Immutable once received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Message {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            session_id: None,
            channel: Channel::Web,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }
}

/// Kinds of structured entities the normalizer can pull out of free text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    OrderNumber,
    Email,
    Phone,
    Product,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderNumber => "order_number",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Product => "product",
        }
    }
}

/// Derived view of a message after normalization. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub cleaned_text: String,
    pub entities: BTreeMap<EntityKind, Vec<String>>,
}

impl NormalizedMessage {
    /// First extracted entity of the given kind, if any.
    pub fn first(&self, kind: EntityKind) -> Option<&str> {
        self.entities.get(&kind).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn has(&self, kind: EntityKind) -> bool {
        self.entities.get(&kind).map(|values| !values.is_empty()).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.cleaned_text.is_empty()
    }
}
