//! Emoji reaction left on a message.

use std::sync::Arc;

use super::{CustomEmoji, User};

/// Logical identity of a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReactionKey {
    pub message_id: String,
    pub emoji_id: String,
    pub sender_id: String,
}

/// Reactions are immutable once built; a removal event drops them.
#[derive(Debug)]
pub struct Reaction {
    message_id: String,
    emoji: Arc<CustomEmoji>,
    sender: Arc<User>,
}

impl Reaction {
    pub fn new(message_id: impl Into<String>, emoji: Arc<CustomEmoji>, sender: Arc<User>) -> Self {
        Self {
            message_id: message_id.into(),
            emoji,
            sender,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn emoji(&self) -> &Arc<CustomEmoji> {
        &self.emoji
    }

    pub fn sender(&self) -> &Arc<User> {
        &self.sender
    }

    pub fn key(&self) -> ReactionKey {
        ReactionKey {
            message_id: self.message_id.clone(),
            emoji_id: self.emoji.id().to_string(),
            sender_id: self.sender.id().to_string(),
        }
    }

    pub fn matches(&self, message_id: &str, emoji_id: &str, sender_id: &str) -> bool {
        self.message_id == message_id && self.emoji.id() == emoji_id && self.sender.id() == sender_id
    }
}
