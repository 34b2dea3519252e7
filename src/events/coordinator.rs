//! Applies events to the cache, then hands them to listeners.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, error};

use super::model::{Dispatched, Event, EventKind, Update};
use crate::cache::EntityCache;
use crate::entity::{Guild, Mergeable, Reaction, ReactionKey};
use crate::error::{EventError, PayloadError};

/// Receives every event that made it through the cache.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &Dispatched);
}

impl<F> Listener for F
where
    F: Fn(&Dispatched) + Send + Sync,
{
    fn on_event(&self, event: &Dispatched) {
        self(event)
    }
}

/// Single sequential entry point for decoded events.
///
/// Events are applied one at a time in call order. Listeners run under the
/// same ordering, so a listener must not dispatch from inside `on_event`.
pub struct UpdateCoordinator {
    cache: Arc<EntityCache>,
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
    sequence: Mutex<()>,
}

impl UpdateCoordinator {
    pub fn new(cache: Arc<EntityCache>) -> Self {
        Self {
            cache,
            listeners: RwLock::new(Vec::new()),
            sequence: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn register<L>(&self, listener: L)
    where
        L: Listener + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Apply `event` to the cache and deliver it.
    ///
    /// Returns `false` when the event was dropped; the failure is logged
    /// and never reaches listeners.
    pub fn dispatch(&self, event: Event) -> bool {
        let _sequence = self.sequence.lock();

        let update = match self.apply(&event) {
            Ok(update) => update,
            Err(e) => {
                error!("Dropping {} event: {}", event.kind, e);
                return false;
            }
        };

        debug!("Dispatching {} ({})", update.name(), event.kind);
        let dispatched = Dispatched {
            timestamp: event.time(),
            update,
        };
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_event(&dispatched);
        }
        true
    }

    fn apply(&self, event: &Event) -> Result<Update, EventError> {
        let cache = &self.cache;

        let update = match EventKind::decode(event)? {
            EventKind::UserUpdated { user_id, body } => {
                let user = cache.user(&user_id)?;
                user.merge(&body)?;
                Update::UserUpdated(user)
            }
            EventKind::GuildUpdated { guild_id, body } => {
                let guild = self.guild(&guild_id)?;
                guild.merge(&body)?;
                Update::GuildUpdated(guild)
            }
            EventKind::GuildDeleted { guild_id } => {
                let guild = cache.remove_guild(&guild_id);
                Update::GuildDeleted { id: guild_id, guild }
            }
            EventKind::MemberJoined { guild_id, user_id } => Update::MemberJoined {
                guild: self.guild(&guild_id)?,
                user: cache.user(&user_id)?,
            },
            EventKind::MemberLeft { guild_id, user_id } => Update::MemberLeft {
                guild_id,
                user: cache.user(&user_id)?,
            },
            EventKind::ChannelCreated { channel_id, body } => {
                Update::ChannelCreated(cache.channel_with(&channel_id, &body)?)
            }
            EventKind::ChannelUpdated { channel_id, body } => {
                // An uncached channel is fetched in full before the change applies.
                let channel = cache.channel(&channel_id)?;
                channel.merge(&body)?;
                Update::ChannelUpdated(channel)
            }
            EventKind::ChannelDeleted { channel_id } => {
                let channel = cache.remove_channel(&channel_id);
                Update::ChannelDeleted { id: channel_id, channel }
            }
            EventKind::MessageCreated { message_id, body } => {
                if let Some(author) = body.pointer("/extra/author") {
                    self.author(author)?;
                }
                Update::MessageCreated(cache.message_with(&message_id, &body)?)
            }
            EventKind::MessageUpdated { message_id, body } => {
                let message = cache.message(&message_id)?;
                message.merge(&body)?;
                Update::MessageUpdated(message)
            }
            EventKind::MessageDeleted { message_id } => {
                let message = cache.remove_message(&message_id);
                Update::MessageDeleted { id: message_id, message }
            }
            EventKind::PrivateMessageUpdated { message_id, body } => {
                let message = cache.cached_message(&message_id);
                if let Some(message) = &message {
                    message.merge(&body)?;
                }
                Update::PrivateMessageUpdated { id: message_id, message }
            }
            EventKind::PrivateMessageDeleted { message_id } => {
                let message = cache.remove_message(&message_id);
                Update::PrivateMessageDeleted { id: message_id, message }
            }
            EventKind::MessagePinned {
                channel_id,
                message_id,
                operator_id,
            } => Update::MessagePinned {
                channel: cache.channel(&channel_id)?,
                message_id,
                operator: cache.user(&operator_id)?,
            },
            EventKind::MessageUnpinned {
                channel_id,
                message_id,
                operator_id,
            } => Update::MessageUnpinned {
                channel: cache.channel(&channel_id)?,
                message_id,
                operator: cache.user(&operator_id)?,
            },
            EventKind::RoleCreated { guild_id, body } => {
                let guild = self.guild(&guild_id)?;
                Update::RoleCreated(cache.role_with(&guild, &body)?)
            }
            EventKind::RoleUpdated { guild_id, body } => {
                let guild = self.guild(&guild_id)?;
                Update::RoleUpdated(cache.role_with(&guild, &body)?)
            }
            EventKind::RoleDeleted { guild_id, role_id } => {
                let role = cache.remove_role(&guild_id, role_id);
                Update::RoleDeleted {
                    guild_id,
                    role_id,
                    role,
                }
            }
            EventKind::EmojiAdded { emoji_id, body } => {
                Update::EmojiAdded(cache.emoji_with(&emoji_id, &body)?)
            }
            EventKind::EmojiUpdated { emoji_id, body } => {
                Update::EmojiUpdated(cache.emoji_with(&emoji_id, &body)?)
            }
            EventKind::EmojiRemoved { emoji_id } => {
                let emoji = cache.remove_emoji(&emoji_id);
                Update::EmojiRemoved { id: emoji_id, emoji }
            }
            EventKind::ReactionAdded {
                message_id,
                user_id,
                emoji,
            } => {
                let emoji_id = emoji_id(&emoji)?;
                let sender = cache.user(&user_id)?;
                let emoji = cache.emoji_with(&emoji_id, &emoji)?;
                let reaction = cache.add_reaction(Arc::new(Reaction::new(message_id, emoji, sender)));
                Update::ReactionAdded(reaction)
            }
            EventKind::ReactionRemoved {
                message_id,
                user_id,
                emoji,
            } => {
                let key = ReactionKey {
                    message_id,
                    emoji_id: emoji_id(&emoji)?,
                    sender_id: user_id,
                };
                let reaction = cache.remove_reaction(&key);
                Update::ReactionRemoved { key, reaction }
            }
            EventKind::VoiceJoined { user_id, channel_id } => Update::VoiceJoined {
                user: cache.user(&user_id)?,
                channel: cache.channel(&channel_id)?,
            },
            EventKind::VoiceLeft { user_id, channel_id } => Update::VoiceLeft {
                user: cache.user(&user_id)?,
                channel: cache.channel(&channel_id)?,
            },
            EventKind::MemberOnline { user_id } => Update::UserOnline(cache.user(&user_id)?),
            EventKind::MemberOffline { user_id } => Update::UserOffline(cache.user(&user_id)?),
            EventKind::Other => Update::Other {
                kind: event.kind.clone(),
                body: event.body.clone(),
            },
        };
        Ok(update)
    }

    /// Guild lookup where an inaccessible guild ends the event.
    fn guild(&self, id: &str) -> Result<Arc<Guild>, EventError> {
        self.cache.guild(id)?.ok_or_else(|| EventError::Unresolved {
            kind: "guild",
            id: id.to_string(),
        })
    }

    fn author(&self, author: &Value) -> Result<(), EventError> {
        let id = author
            .get("id")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("id"))?;
        self.cache.user_with(id, author)?;
        Ok(())
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn emoji_id(emoji: &Value) -> Result<String, PayloadError> {
    emoji
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(PayloadError::MissingField("id"))
}
