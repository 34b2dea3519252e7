//! Guild channel: category, text or voice.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use super::{Entity, Mergeable, ensure_same, lenient_bool, lenient_i64, lenient_string, parse};
use crate::error::PayloadError;

const TYPE_VOICE: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Category,
    Text,
    Voice,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    guild_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    parent_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    is_category: Option<bool>,
    #[serde(rename = "type", default, deserialize_with = "lenient_i64")]
    channel_type: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    level: Option<i64>,
    topic: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    slow_mode: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    limit_amount: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    has_password: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    permission_sync: Option<bool>,
}

impl ChannelPayload {
    fn kind(&self) -> ChannelKind {
        if self.is_category == Some(true) {
            return ChannelKind::Category;
        }
        match self.channel_type {
            Some(TYPE_VOICE) => ChannelKind::Voice,
            // Unknown types are treated as text.
            _ => ChannelKind::Text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub name: String,
    /// `None` for top-level channels.
    pub parent_id: Option<String>,
    pub level: i64,
    pub topic: String,
    /// Seconds between two messages of the same member.
    pub slow_mode: i64,
    pub max_size: i64,
    pub password_protected: bool,
    pub permission_sync: bool,
}

impl ChannelState {
    fn apply(&mut self, payload: ChannelPayload) {
        if let Some(name) = payload.name {
            self.name = name;
        }
        if let Some(parent_id) = payload.parent_id {
            self.parent_id = match parent_id.as_str() {
                "" | "0" => None,
                _ => Some(parent_id),
            };
        }
        if let Some(level) = payload.level {
            self.level = level;
        }
        if let Some(topic) = payload.topic {
            self.topic = topic;
        }
        if let Some(slow_mode) = payload.slow_mode {
            self.slow_mode = slow_mode;
        }
        if let Some(max_size) = payload.limit_amount {
            self.max_size = max_size;
        }
        if let Some(password_protected) = payload.has_password {
            self.password_protected = password_protected;
        }
        if let Some(sync) = payload.permission_sync {
            self.permission_sync = sync;
        }
    }
}

#[derive(Debug)]
pub struct Channel {
    id: String,
    guild_id: String,
    kind: ChannelKind,
    state: RwLock<ChannelState>,
}

impl Channel {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn snapshot(&self) -> ChannelState {
        self.state.read().clone()
    }
}

impl Mergeable for Channel {
    fn merge(&self, payload: &Value) -> Result<(), PayloadError> {
        let payload: ChannelPayload = parse(payload)?;
        ensure_same(&self.id, payload.id.as_deref())?;
        self.state.write().apply(payload);
        Ok(())
    }
}

impl Entity for Channel {
    type Key = String;
    const KIND: &'static str = "channel";

    fn key(&self) -> String {
        self.id.clone()
    }

    fn build(payload: &Value) -> Result<Self, PayloadError> {
        let payload: ChannelPayload = parse(payload)?;
        let id = payload.id.clone().ok_or(PayloadError::MissingField("id"))?;
        let guild_id = payload.guild_id.clone().unwrap_or_default();
        let kind = payload.kind();
        let mut state = ChannelState::default();
        state.apply(payload);
        Ok(Self {
            id,
            guild_id,
            kind,
            state: RwLock::new(state),
        })
    }
}
