//! Guild custom emoji.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use super::{Entity, Mergeable, ensure_same, lenient_i64, lenient_string, parse};
use crate::error::PayloadError;

#[derive(Debug, Deserialize)]
struct EmojiPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    guild_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    emoji_type: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmojiState {
    pub name: String,
    pub emoji_type: i64,
}

#[derive(Debug)]
pub struct CustomEmoji {
    id: String,
    guild_id: Option<String>,
    state: RwLock<EmojiState>,
}

impl CustomEmoji {
    /// Guild encoded in a custom emoji id (`<guild>/<key>`).
    pub fn guild_of(id: &str) -> Option<&str> {
        id.split_once('/')
            .map(|(guild, _)| guild)
            .filter(|guild| !guild.is_empty())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `None` for built-in emoji.
    pub fn guild_id(&self) -> Option<&str> {
        self.guild_id.as_deref()
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn snapshot(&self) -> EmojiState {
        self.state.read().clone()
    }
}

impl Mergeable for CustomEmoji {
    fn merge(&self, payload: &Value) -> Result<(), PayloadError> {
        let payload: EmojiPayload = parse(payload)?;
        ensure_same(&self.id, payload.id.as_deref())?;
        let mut state = self.state.write();
        if let Some(name) = payload.name {
            state.name = name;
        }
        if let Some(emoji_type) = payload.emoji_type {
            state.emoji_type = emoji_type;
        }
        Ok(())
    }
}

impl Entity for CustomEmoji {
    type Key = String;
    const KIND: &'static str = "emoji";

    fn key(&self) -> String {
        self.id.clone()
    }

    fn build(payload: &Value) -> Result<Self, PayloadError> {
        let payload: EmojiPayload = parse(payload)?;
        let id = payload.id.ok_or(PayloadError::MissingField("id"))?;
        let guild_id = payload
            .guild_id
            .filter(|g| !g.is_empty())
            .or_else(|| Self::guild_of(&id).map(str::to_string));
        Ok(Self {
            guild_id,
            state: RwLock::new(EmojiState {
                name: payload.name.unwrap_or_default(),
                emoji_type: payload.emoji_type.unwrap_or_default(),
            }),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guild_from_id() {
        let emoji = CustomEmoji::build(&json!({"id": "G1/abc", "name": "party"})).unwrap();
        assert_eq!(emoji.guild_id(), Some("G1"));

        let builtin = CustomEmoji::build(&json!({"id": "[#128077;]", "name": "+1"})).unwrap();
        assert_eq!(builtin.guild_id(), None);
    }

    #[test]
    fn test_merge_name() {
        let emoji = CustomEmoji::build(&json!({"id": "G1/abc", "name": "party"})).unwrap();
        emoji.merge(&json!({"id": "G1/abc", "name": "fiesta"})).unwrap();
        assert_eq!(emoji.name(), "fiesta");
    }
}
