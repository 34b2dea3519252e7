//! Remote API route table.
//!
//! A route is the logical `(method, path)` of a call. Rate-limit state is
//! keyed by route, not by the literal URL, so query strings never split a
//! bucket.

use std::fmt;

/// HTTP method used by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

macro_rules! routes {
    ($($variant:ident => ($method:ident, $path:literal, $name:literal),)*) => {
        /// Every route of the v3 API this client calls.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HttpRoute {
            $($variant,)*
        }

        impl HttpRoute {
            /// All known routes, in declaration order.
            pub const ALL: &'static [HttpRoute] = &[$(HttpRoute::$variant,)*];

            pub fn method(self) -> Method {
                match self {
                    $(HttpRoute::$variant => Method::$method,)*
                }
            }

            /// Path relative to the API root, e.g. `/v3/user/view`.
            pub fn path(self) -> &'static str {
                match self {
                    $(HttpRoute::$variant => $path,)*
                }
            }

            /// Stable identifier handed to rate-limit wait policies.
            pub fn name(self) -> &'static str {
                match self {
                    $(HttpRoute::$variant => $name,)*
                }
            }
        }
    };
}

routes! {
    // guild
    GuildJoinedList => (Get, "/v3/guild/list", "guild-joined-list"),
    GuildInfo => (Get, "/v3/guild/view", "guild-info"),
    GuildUsers => (Get, "/v3/guild/user-list", "guild-users"),
    GuildNickname => (Post, "/v3/guild/nickname", "guild-nickname"),
    GuildLeave => (Post, "/v3/guild/leave", "guild-leave"),
    GuildKick => (Post, "/v3/guild/kickout", "guild-kick"),

    // channel
    ChannelList => (Get, "/v3/channel/list", "channel-list"),
    ChannelInfo => (Get, "/v3/channel/view", "channel-info"),
    ChannelCreate => (Post, "/v3/channel/create", "channel-create"),
    ChannelUpdate => (Post, "/v3/channel/update", "channel-update"),
    ChannelDelete => (Post, "/v3/channel/delete", "channel-delete"),

    // channel message
    ChannelMessageQuery => (Get, "/v3/message/list", "channel-message-query"),
    ChannelMessageInfo => (Get, "/v3/message/view", "channel-message-info"),
    ChannelMessageSend => (Post, "/v3/message/create", "channel-message-send"),
    ChannelMessageUpdate => (Post, "/v3/message/update", "channel-message-update"),
    ChannelMessageDelete => (Post, "/v3/message/delete", "channel-message-delete"),
    ChannelMessageReactionList => (Get, "/v3/message/reaction-list", "channel-message-reaction-list"),
    ChannelMessageReactionAdd => (Post, "/v3/message/add-reaction", "channel-message-reaction-add"),
    ChannelMessageReactionRemove => (Post, "/v3/message/delete-reaction", "channel-message-reaction-remove"),

    // direct message
    UserChatMessageCreate => (Post, "/v3/direct-message/create", "user-chat-message-create"),
    UserChatMessageDelete => (Post, "/v3/direct-message/delete", "user-chat-message-delete"),

    // user
    UserMe => (Get, "/v3/user/me", "user-me"),
    UserWho => (Get, "/v3/user/view", "user-who"),
    UserBotOffline => (Post, "/v3/user/offline", "user-bot-offline"),

    // asset
    AssetUpload => (Post, "/v3/asset/create", "asset-upload"),

    // role
    RoleList => (Get, "/v3/guild-role/list", "role-list"),
    RoleCreate => (Post, "/v3/guild-role/create", "role-create"),
    RoleUpdate => (Post, "/v3/guild-role/update", "role-update"),
    RoleDelete => (Post, "/v3/guild-role/delete", "role-delete"),
    RoleGrant => (Post, "/v3/guild-role/grant", "role-grant"),
    RoleRevoke => (Post, "/v3/guild-role/revoke", "role-revoke"),

    // guild emoji
    GuildEmojiList => (Get, "/v3/guild-emoji/list", "guild-emoji-list"),
    GuildEmojiCreate => (Post, "/v3/guild-emoji/create", "guild-emoji-create"),
    GuildEmojiUpdate => (Post, "/v3/guild-emoji/update", "guild-emoji-update"),
    GuildEmojiDelete => (Post, "/v3/guild-emoji/delete", "guild-emoji-delete"),

    // game
    GameList => (Get, "/v3/game", "game-list"),
    GameCreate => (Post, "/v3/game/create", "game-create"),
    GameUpdate => (Post, "/v3/game/update", "game-update"),
    GameDelete => (Post, "/v3/game/delete", "game-delete"),
    GameActivity => (Post, "/v3/game/activity", "game-activity"),
    GameDeleteActivity => (Post, "/v3/game/delete-activity", "game-delete-activity"),
}

impl fmt::Display for HttpRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method().as_str(), self.path())
    }
}
