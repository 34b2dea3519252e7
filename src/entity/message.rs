//! Chat message.
//!
//! Messages are short-lived in the cache and removed explicitly when the
//! platform reports their deletion.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use super::{Entity, Mergeable, ensure_same, lenient_i64, lenient_string, parse};
use crate::error::PayloadError;

#[derive(Debug, Deserialize)]
struct AuthorRef {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
}

/// Fetched records name fields differently from event bodies, and merged
/// payloads may carry both spellings.
#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    msg_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    channel_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    target_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    author_id: Option<String>,
    author: Option<AuthorRef>,
    content: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_i64")]
    message_type: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    created_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    create_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    updated_at: Option<i64>,
}

impl MessagePayload {
    fn id(&self) -> Option<&str> {
        self.id.as_deref().or(self.msg_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageState {
    pub content: String,
    pub message_type: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct Message {
    id: String,
    channel_id: Option<String>,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    state: RwLock<MessageState>,
}

fn millis(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.filter(|ms| *ms > 0)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

impl Message {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `None` for direct messages.
    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    pub fn author_id(&self) -> Option<&str> {
        self.author_id.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn content(&self) -> String {
        self.state.read().content.clone()
    }

    pub fn snapshot(&self) -> MessageState {
        self.state.read().clone()
    }
}

impl Mergeable for Message {
    fn merge(&self, payload: &Value) -> Result<(), PayloadError> {
        let payload: MessagePayload = parse(payload)?;
        ensure_same(&self.id, payload.id())?;
        if let Some(msg_id) = payload.msg_id.as_deref() {
            ensure_same(&self.id, Some(msg_id))?;
        }
        let mut state = self.state.write();
        if let Some(content) = payload.content {
            state.content = content;
        }
        if let Some(message_type) = payload.message_type {
            state.message_type = message_type;
        }
        if let Some(updated_at) = millis(payload.updated_at) {
            state.updated_at = Some(updated_at);
        }
        Ok(())
    }
}

impl Entity for Message {
    type Key = String;
    const KIND: &'static str = "message";

    fn key(&self) -> String {
        self.id.clone()
    }

    fn build(payload: &Value) -> Result<Self, PayloadError> {
        let payload: MessagePayload = parse(payload)?;
        let id = payload
            .id()
            .map(str::to_string)
            .ok_or(PayloadError::MissingField("id"))?;
        let author_id = payload
            .author_id
            .or_else(|| payload.author.and_then(|author| author.id));
        Ok(Self {
            id,
            channel_id: payload
                .channel_id
                .or(payload.target_id)
                .filter(|c| !c.is_empty()),
            author_id,
            created_at: millis(payload.created_at.or(payload.create_at)),
            state: RwLock::new(MessageState {
                content: payload.content.unwrap_or_default(),
                message_type: payload.message_type.unwrap_or(1),
                updated_at: millis(payload.updated_at),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_from_view_payload() {
        let message = Message::build(&json!({
            "id": "M1",
            "channel_id": "C1",
            "content": "hello",
            "type": 9,
            "author": {"id": "U1", "username": "alice"},
            "create_at": 1_700_000_000_000i64,
        }))
        .unwrap();

        assert_eq!(message.author_id(), Some("U1"));
        assert_eq!(message.channel_id(), Some("C1"));
        assert_eq!(message.created_at().map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(message.snapshot().message_type, 9);
    }

    #[test]
    fn test_merge_update_event_body() {
        let message = Message::build(&json!({"msg_id": "M1", "target_id": "C1", "content": "v1"})).unwrap();
        message
            .merge(&json!({"msg_id": "M1", "content": "v2", "updated_at": 1_700_000_100_000i64}))
            .unwrap();

        let state = message.snapshot();
        assert_eq!(state.content, "v2");
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn test_both_field_spellings_accepted() {
        let message = Message::build(&json!({
            "id": "M1",
            "msg_id": "M1",
            "channel_id": "C1",
            "target_id": "C1",
            "created_at": 1_700_000_000_000i64,
            "create_at": 1_600_000_000_000i64,
            "content": "v1",
        }))
        .unwrap();
        assert_eq!(message.channel_id(), Some("C1"));
        assert_eq!(message.created_at().map(|t| t.timestamp()), Some(1_700_000_000));

        message
            .merge(&json!({"id": "M1", "msg_id": "M1", "target_id": "C1", "channel_id": "C1", "content": "v2"}))
            .unwrap();
        assert_eq!(message.content(), "v2");

        assert!(matches!(
            message.merge(&json!({"id": "M1", "msg_id": "M9", "content": "v3"})),
            Err(PayloadError::IdMismatch { .. })
        ));
        assert_eq!(message.content(), "v2");
    }
}
