//! Decoded events coming in, cache-backed updates going out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Channel, CustomEmoji, Guild, Message, Reaction, ReactionKey, Role, User, parse};
use crate::error::PayloadError;

/// One event as produced by the transport decoder.
///
/// `target_id` carries the guild for guild-scoped events and the channel
/// for messages; `body` is the event-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target_id: String,
    /// Milliseconds since the epoch.
    #[serde(alias = "msg_timestamp", default)]
    pub timestamp: i64,
    #[serde(default)]
    pub body: Value,
}

impl Event {
    /// Event stamped with the current time.
    pub fn new(kind: impl Into<String>, body: Value) -> Self {
        Self {
            kind: kind.into(),
            target_id: String::new(),
            timestamp: Utc::now().timestamp_millis(),
            body,
        }
    }

    #[must_use]
    pub fn target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = target_id.into();
        self
    }

    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Deserialize)]
struct IdBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    msg_id: String,
}

#[derive(Debug, Deserialize)]
struct PinBody {
    channel_id: String,
    msg_id: String,
    operator_id: String,
}

#[derive(Debug, Deserialize)]
struct VoiceBody {
    user_id: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct ReactionBody {
    msg_id: String,
    user_id: String,
    emoji: Value,
}

/// Typed view of an [`Event`], decoded before any cache work.
#[derive(Debug, Clone)]
pub enum EventKind {
    UserUpdated { user_id: String, body: Value },
    GuildUpdated { guild_id: String, body: Value },
    GuildDeleted { guild_id: String },
    MemberJoined { guild_id: String, user_id: String },
    MemberLeft { guild_id: String, user_id: String },
    ChannelCreated { channel_id: String, body: Value },
    ChannelUpdated { channel_id: String, body: Value },
    ChannelDeleted { channel_id: String },
    MessageCreated { message_id: String, body: Value },
    MessageUpdated { message_id: String, body: Value },
    MessageDeleted { message_id: String },
    PrivateMessageUpdated { message_id: String, body: Value },
    PrivateMessageDeleted { message_id: String },
    MessagePinned { channel_id: String, message_id: String, operator_id: String },
    MessageUnpinned { channel_id: String, message_id: String, operator_id: String },
    RoleCreated { guild_id: String, body: Value },
    RoleUpdated { guild_id: String, body: Value },
    RoleDeleted { guild_id: String, role_id: i64 },
    EmojiAdded { emoji_id: String, body: Value },
    EmojiUpdated { emoji_id: String, body: Value },
    EmojiRemoved { emoji_id: String },
    ReactionAdded { message_id: String, user_id: String, emoji: Value },
    ReactionRemoved { message_id: String, user_id: String, emoji: Value },
    VoiceJoined { user_id: String, channel_id: String },
    VoiceLeft { user_id: String, channel_id: String },
    MemberOnline { user_id: String },
    MemberOffline { user_id: String },
    /// Anything the cache has no stake in.
    Other,
}

impl EventKind {
    /// Event type names with a cache effect.
    pub const KNOWN: &'static [&'static str] = &[
        "user_updated",
        "updated_guild",
        "deleted_guild",
        "joined_guild",
        "exited_guild",
        "added_channel",
        "updated_channel",
        "deleted_channel",
        "message_created",
        "updated_message",
        "deleted_message",
        "updated_private_message",
        "deleted_private_message",
        "pinned_message",
        "unpinned_message",
        "added_role",
        "updated_role",
        "deleted_role",
        "added_emoji",
        "updated_emoji",
        "removed_emoji",
        "added_reaction",
        "deleted_reaction",
        "joined_channel",
        "exited_channel",
        "guild_member_online",
        "guild_member_offline",
    ];

    pub fn decode(event: &Event) -> Result<Self, PayloadError> {
        let body = &event.body;
        let guild_id = || event.target_id.clone();

        let kind = match event.kind.as_str() {
            "user_updated" => Self::UserUpdated {
                user_id: parse::<UserBody>(body)?.user_id,
                body: body.clone(),
            },
            "updated_guild" => Self::GuildUpdated {
                guild_id: parse::<IdBody>(body)?.id,
                body: body.clone(),
            },
            "deleted_guild" => Self::GuildDeleted {
                guild_id: parse::<IdBody>(body)?.id,
            },
            "joined_guild" => Self::MemberJoined {
                guild_id: guild_id(),
                user_id: parse::<UserBody>(body)?.user_id,
            },
            "exited_guild" => Self::MemberLeft {
                guild_id: guild_id(),
                user_id: parse::<UserBody>(body)?.user_id,
            },
            "added_channel" => Self::ChannelCreated {
                channel_id: parse::<IdBody>(body)?.id,
                body: body.clone(),
            },
            "updated_channel" => Self::ChannelUpdated {
                channel_id: parse::<IdBody>(body)?.id,
                body: body.clone(),
            },
            "deleted_channel" => Self::ChannelDeleted {
                channel_id: parse::<IdBody>(body)?.id,
            },
            "message_created" => Self::MessageCreated {
                message_id: parse::<MessageRef>(body)?.msg_id,
                body: body.clone(),
            },
            "updated_message" => Self::MessageUpdated {
                message_id: parse::<MessageRef>(body)?.msg_id,
                body: body.clone(),
            },
            "deleted_message" => Self::MessageDeleted {
                message_id: parse::<MessageRef>(body)?.msg_id,
            },
            "updated_private_message" => Self::PrivateMessageUpdated {
                message_id: parse::<MessageRef>(body)?.msg_id,
                body: body.clone(),
            },
            "deleted_private_message" => Self::PrivateMessageDeleted {
                message_id: parse::<MessageRef>(body)?.msg_id,
            },
            "pinned_message" => {
                let pin: PinBody = parse(body)?;
                Self::MessagePinned {
                    channel_id: pin.channel_id,
                    message_id: pin.msg_id,
                    operator_id: pin.operator_id,
                }
            }
            "unpinned_message" => {
                let pin: PinBody = parse(body)?;
                Self::MessageUnpinned {
                    channel_id: pin.channel_id,
                    message_id: pin.msg_id,
                    operator_id: pin.operator_id,
                }
            }
            "added_role" => Self::RoleCreated {
                guild_id: guild_id(),
                body: body.clone(),
            },
            "updated_role" => Self::RoleUpdated {
                guild_id: guild_id(),
                body: body.clone(),
            },
            "deleted_role" => Self::RoleDeleted {
                guild_id: guild_id(),
                role_id: Role::id_of(body).ok_or(PayloadError::MissingField("role_id"))?,
            },
            "added_emoji" => Self::EmojiAdded {
                emoji_id: parse::<IdBody>(body)?.id,
                body: body.clone(),
            },
            "updated_emoji" => Self::EmojiUpdated {
                emoji_id: parse::<IdBody>(body)?.id,
                body: body.clone(),
            },
            "removed_emoji" => Self::EmojiRemoved {
                emoji_id: parse::<IdBody>(body)?.id,
            },
            "added_reaction" => {
                let reaction: ReactionBody = parse(body)?;
                Self::ReactionAdded {
                    message_id: reaction.msg_id,
                    user_id: reaction.user_id,
                    emoji: reaction.emoji,
                }
            }
            "deleted_reaction" => {
                let reaction: ReactionBody = parse(body)?;
                Self::ReactionRemoved {
                    message_id: reaction.msg_id,
                    user_id: reaction.user_id,
                    emoji: reaction.emoji,
                }
            }
            "joined_channel" => {
                let voice: VoiceBody = parse(body)?;
                Self::VoiceJoined {
                    user_id: voice.user_id,
                    channel_id: voice.channel_id,
                }
            }
            "exited_channel" => {
                let voice: VoiceBody = parse(body)?;
                Self::VoiceLeft {
                    user_id: voice.user_id,
                    channel_id: voice.channel_id,
                }
            }
            "guild_member_online" => Self::MemberOnline {
                user_id: parse::<UserBody>(body)?.user_id,
            },
            "guild_member_offline" => Self::MemberOffline {
                user_id: parse::<UserBody>(body)?.user_id,
            },
            _ => Self::Other,
        };
        Ok(kind)
    }
}

/// Event after its cache mutation, as listeners see it.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub timestamp: DateTime<Utc>,
    pub update: Update,
}

/// Entities touched by an event.
///
/// Removal variants carry the instance that was cached, if any.
#[derive(Debug, Clone)]
pub enum Update {
    UserUpdated(Arc<User>),
    GuildUpdated(Arc<Guild>),
    GuildDeleted { id: String, guild: Option<Arc<Guild>> },
    MemberJoined { guild: Arc<Guild>, user: Arc<User> },
    MemberLeft { guild_id: String, user: Arc<User> },
    ChannelCreated(Arc<Channel>),
    ChannelUpdated(Arc<Channel>),
    ChannelDeleted { id: String, channel: Option<Arc<Channel>> },
    MessageCreated(Arc<Message>),
    MessageUpdated(Arc<Message>),
    MessageDeleted { id: String, message: Option<Arc<Message>> },
    /// Direct messages are never fetched; `message` is set only when cached.
    PrivateMessageUpdated { id: String, message: Option<Arc<Message>> },
    PrivateMessageDeleted { id: String, message: Option<Arc<Message>> },
    MessagePinned { channel: Arc<Channel>, message_id: String, operator: Arc<User> },
    MessageUnpinned { channel: Arc<Channel>, message_id: String, operator: Arc<User> },
    RoleCreated(Arc<Role>),
    RoleUpdated(Arc<Role>),
    RoleDeleted { guild_id: String, role_id: i64, role: Option<Arc<Role>> },
    EmojiAdded(Arc<CustomEmoji>),
    EmojiUpdated(Arc<CustomEmoji>),
    EmojiRemoved { id: String, emoji: Option<Arc<CustomEmoji>> },
    ReactionAdded(Arc<Reaction>),
    ReactionRemoved { key: ReactionKey, reaction: Option<Arc<Reaction>> },
    VoiceJoined { user: Arc<User>, channel: Arc<Channel> },
    VoiceLeft { user: Arc<User>, channel: Arc<Channel> },
    UserOnline(Arc<User>),
    UserOffline(Arc<User>),
    Other { kind: String, body: Value },
}

impl Update {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Update::UserUpdated(_) => "user-updated",
            Update::GuildUpdated(_) => "guild-updated",
            Update::GuildDeleted { .. } => "guild-deleted",
            Update::MemberJoined { .. } => "member-joined",
            Update::MemberLeft { .. } => "member-left",
            Update::ChannelCreated(_) => "channel-created",
            Update::ChannelUpdated(_) => "channel-updated",
            Update::ChannelDeleted { .. } => "channel-deleted",
            Update::MessageCreated(_) => "message-created",
            Update::MessageUpdated(_) => "message-updated",
            Update::MessageDeleted { .. } => "message-deleted",
            Update::PrivateMessageUpdated { .. } => "private-message-updated",
            Update::PrivateMessageDeleted { .. } => "private-message-deleted",
            Update::MessagePinned { .. } => "message-pinned",
            Update::MessageUnpinned { .. } => "message-unpinned",
            Update::RoleCreated(_) => "role-created",
            Update::RoleUpdated(_) => "role-updated",
            Update::RoleDeleted { .. } => "role-deleted",
            Update::EmojiAdded(_) => "emoji-added",
            Update::EmojiUpdated(_) => "emoji-updated",
            Update::EmojiRemoved { .. } => "emoji-removed",
            Update::ReactionAdded(_) => "reaction-added",
            Update::ReactionRemoved { .. } => "reaction-removed",
            Update::VoiceJoined { .. } => "voice-joined",
            Update::VoiceLeft { .. } => "voice-left",
            Update::UserOnline(_) => "user-online",
            Update::UserOffline(_) => "user-offline",
            Update::Other { .. } => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_json_line() {
        let event: Event = serde_json::from_str(
            r#"{"type":"deleted_channel","target_id":"G1","msg_timestamp":1700000000000,"body":{"id":"C1"}}"#,
        )
        .unwrap();

        assert_eq!(event.kind, "deleted_channel");
        assert_eq!(event.time().timestamp(), 1_700_000_000);
        assert!(matches!(
            EventKind::decode(&event).unwrap(),
            EventKind::ChannelDeleted { channel_id } if channel_id == "C1"
        ));
    }

    #[test]
    fn test_guild_scoped_events_use_target() {
        let event = Event::new("deleted_role", json!({"role_id": "7", "name": "x"})).target("G1");
        match EventKind::decode(&event).unwrap() {
            EventKind::RoleDeleted { guild_id, role_id } => {
                assert_eq!(guild_id, "G1");
                assert_eq!(role_id, 7);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_ids_are_errors() {
        let event = Event::new("updated_channel", json!({"name": "no id"}));
        assert!(EventKind::decode(&event).is_err());

        let event = Event::new("deleted_role", json!({}));
        assert!(matches!(
            EventKind::decode(&event),
            Err(PayloadError::MissingField("role_id"))
        ));
    }

    #[test]
    fn test_unknown_kinds_pass_through() {
        let event = Event::new("message_btn_click", json!({"value": "x"}));
        assert!(matches!(EventKind::decode(&event).unwrap(), EventKind::Other));
        assert!(!EventKind::KNOWN.contains(&"message_btn_click"));
    }

    #[test]
    fn test_every_known_kind_decodes() {
        let body = json!({
            "id": "X1",
            "msg_id": "M1",
            "user_id": "U1",
            "channel_id": "C1",
            "operator_id": "U2",
            "role_id": 3,
            "emoji": {"id": "G1/a", "name": "party"},
        });
        for kind in EventKind::KNOWN {
            let event = Event::new(*kind, body.clone()).target("G1");
            let decoded = EventKind::decode(&event).unwrap();
            assert!(!matches!(decoded, EventKind::Other), "{kind} decoded as Other");
        }
    }

    #[test]
    fn test_pin_and_voice_bodies() {
        let event = Event::new(
            "pinned_message",
            json!({"channel_id": "C1", "channel_type": 1, "msg_id": "M1", "operator_id": "U2"}),
        );
        match EventKind::decode(&event).unwrap() {
            EventKind::MessagePinned {
                channel_id,
                message_id,
                operator_id,
            } => assert_eq!((channel_id.as_str(), message_id.as_str(), operator_id.as_str()), ("C1", "M1", "U2")),
            other => panic!("unexpected {other:?}"),
        }

        let event = Event::new("exited_channel", json!({"user_id": "U1"}));
        assert!(EventKind::decode(&event).is_err());
    }
}
