//! Entity module - locally mirrored server objects.
//!
//! Every entity is shared as `Arc<T>` and mutated in place through its own
//! lock, so all holders of a reference observe later updates. Payloads are
//! the `data` objects the remote API and the event stream deliver; merges
//! accept partial payloads and only touch fields that are present.

mod channel;
mod emoji;
mod game;
mod guild;
mod message;
mod reaction;
mod role;
mod user;

pub use channel::{Channel, ChannelKind, ChannelState};
pub use emoji::{CustomEmoji, EmojiState};
pub use game::{Game, GameState};
pub use guild::{Guild, GuildState};
pub use message::{Message, MessageState};
pub use reaction::{Reaction, ReactionKey};
pub use role::{Role, RoleState};
pub use user::{User, UserState};

use std::fmt::Debug;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::PayloadError;

/// In-place update from a (possibly partial) payload.
pub trait Mergeable: Send + Sync + 'static {
    /// Apply `payload` to this instance. Fields absent from the payload
    /// keep their current value. Fails without side effects if the payload
    /// describes a different entity.
    fn merge(&self, payload: &Value) -> Result<(), PayloadError>;
}

/// Entity that can be built from a payload on its own.
pub trait Entity: Mergeable + Sized {
    type Key: Hash + Eq + Clone + Debug + Send + Sync + 'static;

    /// Human-readable kind, used in logs and errors.
    const KIND: &'static str;

    fn key(&self) -> Self::Key;

    fn build(payload: &Value) -> Result<Self, PayloadError>;
}

pub(crate) fn parse<T: DeserializeOwned>(payload: &Value) -> Result<T, PayloadError> {
    Ok(T::deserialize(payload)?)
}

pub(crate) fn ensure_same(expected: &str, found: Option<&str>) -> Result<(), PayloadError> {
    match found {
        Some(found) if found != expected => Err(PayloadError::IdMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Accepts `true`, `1`, `"1"` style flags.
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|n| n != 0.0)),
        Some(Value::String(s)) => Some(matches!(s.as_str(), "1" | "true")),
        _ => None,
    })
}

/// Accepts ids and similar fields sent either as strings or numbers.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts integers sent either as numbers or numeric strings.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "lenient_bool")]
        flag: Option<bool>,
        #[serde(default, deserialize_with = "lenient_string")]
        id: Option<String>,
        #[serde(default, deserialize_with = "lenient_i64")]
        count: Option<i64>,
    }

    #[test]
    fn test_lenient_fields() {
        let sample: Sample = parse(&json!({"flag": 1, "id": 42, "count": "7"})).unwrap();
        assert_eq!(sample.flag, Some(true));
        assert_eq!(sample.id.as_deref(), Some("42"));
        assert_eq!(sample.count, Some(7));

        let empty: Sample = parse(&json!({})).unwrap();
        assert_eq!(empty.flag, None);
        assert_eq!(empty.id, None);
        assert_eq!(empty.count, None);
    }

    #[test]
    fn test_ensure_same() {
        assert!(ensure_same("a", Some("a")).is_ok());
        assert!(ensure_same("a", None).is_ok());
        assert!(matches!(
            ensure_same("a", Some("b")),
            Err(PayloadError::IdMismatch { .. })
        ));
    }
}
