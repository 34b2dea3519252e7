//! Entity cache - one weakly-owned table per entity kind.
//!
//! Keyed kinds (users, guilds, channels, emojis, messages) follow one
//! shape: `get` falls back to a blocking fetch on a miss, `*_with` merges a
//! payload into the live instance or builds a new one without touching the
//! network. Scan kinds (roles, reactions, games) are searched linearly.

use std::convert::Infallible;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::{CacheConfig, WeakList, WeakTable};
use crate::entity::{
    Channel, CustomEmoji, Entity, Game, Guild, Mergeable, Message, Reaction, ReactionKey, Role,
    User, ensure_same,
};
use crate::error::{ApiError, PayloadError};
use crate::network::{HttpRoute, RequestClient};

/// Page size requested from list routes.
const PAGE_SIZE: &str = "100";

pub struct EntityCache {
    http: Arc<RequestClient>,
    users: WeakTable<String, User>,
    guilds: WeakTable<String, Guild>,
    channels: WeakTable<String, Channel>,
    emojis: WeakTable<String, CustomEmoji>,
    messages: WeakTable<String, Message>,
    /// Guild id -> roles of that guild.
    roles: DashMap<String, WeakList<Role>>,
    /// Message id -> reactions on that message.
    reactions: DashMap<String, WeakList<Reaction>>,
    games: WeakList<Game>,
}

impl EntityCache {
    pub fn new(http: Arc<RequestClient>, config: &CacheConfig) -> Self {
        Self {
            http,
            users: WeakTable::new("users", config),
            guilds: WeakTable::new("guilds", config),
            channels: WeakTable::new("channels", config),
            emojis: WeakTable::new("emojis", config),
            messages: WeakTable::new("messages", config),
            roles: DashMap::new(),
            reactions: DashMap::new(),
            games: WeakList::new(),
        }
    }

    pub fn http(&self) -> &Arc<RequestClient> {
        &self.http
    }

    // ----- users -----

    /// Cached user, fetched on a miss.
    pub fn user(&self, id: &str) -> Result<Arc<User>, ApiError> {
        resolve(&self.users, id, || {
            self.http.get(HttpRoute::UserWho, &[("user_id", id)])
        })
    }

    /// Merge `payload` into the cached user, or build it. Never fetches.
    pub fn user_with(&self, id: &str, payload: &Value) -> Result<Arc<User>, PayloadError> {
        merge_or_build(&self.users, id, payload)
    }

    /// The account this client is authenticated as. Always asks the server.
    pub fn me(&self) -> Result<Arc<User>, ApiError> {
        let payload = self.http.get(HttpRoute::UserMe, &[])?;
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("id"))?
            .to_string();
        Ok(self.user_with(&id, &payload)?)
    }

    pub fn add_user(&self, user: &Arc<User>) {
        self.users.insert(user.key(), user);
    }

    pub fn remove_user(&self, id: &str) -> Option<Arc<User>> {
        self.users.remove(&id.to_string())
    }

    // ----- guilds -----

    /// Cached guild, fetched on a miss.
    ///
    /// A guild the client may not see resolves to `None` instead of an
    /// error; every other failure is returned.
    pub fn guild(&self, id: &str) -> Result<Option<Arc<Guild>>, ApiError> {
        let fetched = resolve(&self.guilds, id, || {
            self.http.get(HttpRoute::GuildInfo, &[("guild_id", id)])
        });
        match fetched {
            Ok(guild) => Ok(Some(guild)),
            Err(err) if err.is_access_denied() => {
                warn!("Access to guild {} denied: {}", id, err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn guild_with(&self, id: &str, payload: &Value) -> Result<Arc<Guild>, PayloadError> {
        merge_or_build(&self.guilds, id, payload)
    }

    pub fn add_guild(&self, guild: &Arc<Guild>) {
        self.guilds.insert(guild.key(), guild);
    }

    /// Forget the guild and its roles.
    pub fn remove_guild(&self, id: &str) -> Option<Arc<Guild>> {
        self.roles.remove(id);
        self.guilds.remove(&id.to_string())
    }

    // ----- channels -----

    pub fn channel(&self, id: &str) -> Result<Arc<Channel>, ApiError> {
        resolve(&self.channels, id, || {
            self.http.get(HttpRoute::ChannelInfo, &[("target_id", id)])
        })
    }

    pub fn channel_with(&self, id: &str, payload: &Value) -> Result<Arc<Channel>, PayloadError> {
        merge_or_build(&self.channels, id, payload)
    }

    /// Cached channel without any network fallback.
    pub fn cached_channel(&self, id: &str) -> Option<Arc<Channel>> {
        self.channels.get(&id.to_string())
    }

    pub fn add_channel(&self, channel: &Arc<Channel>) {
        self.channels.insert(channel.key(), channel);
    }

    pub fn remove_channel(&self, id: &str) -> Option<Arc<Channel>> {
        self.channels.remove(&id.to_string())
    }

    // ----- emojis -----

    /// Cached custom emoji.
    ///
    /// On a miss the owning guild's emoji list is fetched and cached;
    /// emojis that belong to no guild, or that the guild no longer has,
    /// resolve to `None`.
    pub fn emoji(&self, id: &str) -> Result<Option<Arc<CustomEmoji>>, ApiError> {
        if let Some(hit) = self.emojis.get(&id.to_string()) {
            debug!("emoji cache hit: {}", id);
            return Ok(Some(hit));
        }
        let Some(guild_id) = CustomEmoji::guild_of(id) else {
            return Ok(None);
        };
        debug!("emoji cache miss: {}, listing guild {}", id, guild_id);

        let mut found = None;
        for item in self.fetch_all(HttpRoute::GuildEmojiList, &[("guild_id", guild_id)])? {
            let Some(item_id) = item.get("id").and_then(Value::as_str) else {
                continue;
            };
            let emoji = self.emoji_with(item_id, &item)?;
            if item_id == id {
                found = Some(emoji);
            }
        }
        Ok(found)
    }

    pub fn emoji_with(&self, id: &str, payload: &Value) -> Result<Arc<CustomEmoji>, PayloadError> {
        merge_or_build(&self.emojis, id, payload)
    }

    pub fn add_emoji(&self, emoji: &Arc<CustomEmoji>) {
        self.emojis.insert(emoji.key(), emoji);
    }

    pub fn remove_emoji(&self, id: &str) -> Option<Arc<CustomEmoji>> {
        self.emojis.remove(&id.to_string())
    }

    // ----- messages -----

    pub fn message(&self, id: &str) -> Result<Arc<Message>, ApiError> {
        resolve(&self.messages, id, || {
            self.http.get(HttpRoute::ChannelMessageInfo, &[("msg_id", id)])
        })
    }

    pub fn message_with(&self, id: &str, payload: &Value) -> Result<Arc<Message>, PayloadError> {
        merge_or_build(&self.messages, id, payload)
    }

    pub fn cached_message(&self, id: &str) -> Option<Arc<Message>> {
        self.messages.get(&id.to_string())
    }

    pub fn add_message(&self, message: &Arc<Message>) {
        self.messages.insert(message.key(), message);
    }

    /// Forget the message and every reaction on it.
    pub fn remove_message(&self, id: &str) -> Option<Arc<Message>> {
        self.reactions.remove(id);
        self.messages.remove(&id.to_string())
    }

    // ----- roles -----

    /// Cached role of an already resolved guild. Never fetches.
    pub fn role(&self, guild: &Guild, id: i64) -> Option<Arc<Role>> {
        let found = self.roles.get(guild.id())?.find(|role| role.id() == id);
        if found.is_none() {
            prune(&self.roles, guild.id());
        }
        found
    }

    pub fn role_with(&self, guild: &Guild, payload: &Value) -> Result<Arc<Role>, PayloadError> {
        let id = Role::id_of(payload).ok_or(PayloadError::MissingField("role_id"))?;
        let list = self.roles.entry(guild.id().to_string()).or_default();
        let (role, created) = list.find_or_insert_with(
            |role| role.id() == id,
            || Role::build(guild.id(), payload).map(Arc::new),
        )?;
        if !created {
            role.merge(payload)?;
        }
        Ok(role)
    }

    pub fn add_role(&self, role: &Arc<Role>) {
        self.roles
            .entry(role.guild_id().to_string())
            .or_default()
            .push(role);
    }

    pub fn remove_role(&self, guild_id: &str, id: i64) -> Option<Arc<Role>> {
        let removed = self
            .roles
            .get(guild_id)?
            .remove_where(|role| role.id() == id)
            .into_iter()
            .next();
        prune(&self.roles, guild_id);
        removed
    }

    /// Fetch every role of `guild` and merge them into the cache.
    pub fn load_roles(&self, guild: &Guild) -> Result<Vec<Arc<Role>>, ApiError> {
        self.fetch_all(HttpRoute::RoleList, &[("guild_id", guild.id())])?
            .iter()
            .map(|item| self.role_with(guild, item).map_err(ApiError::from))
            .collect()
    }

    // ----- reactions -----

    pub fn reaction(&self, message_id: &str, emoji_id: &str, sender_id: &str) -> Option<Arc<Reaction>> {
        let found = self
            .reactions
            .get(message_id)?
            .find(|r| r.matches(message_id, emoji_id, sender_id));
        if found.is_none() {
            prune(&self.reactions, message_id);
        }
        found
    }

    /// Track `reaction`, or return the equal one already tracked.
    pub fn add_reaction(&self, reaction: Arc<Reaction>) -> Arc<Reaction> {
        let key = reaction.key();
        let list = self.reactions.entry(key.message_id.clone()).or_default();
        let outcome = list.find_or_insert_with(
            |r| r.matches(&key.message_id, &key.emoji_id, &key.sender_id),
            || Ok::<_, Infallible>(reaction),
        );
        match outcome {
            Ok((tracked, _)) => tracked,
            Err(never) => match never {},
        }
    }

    pub fn remove_reaction(&self, key: &ReactionKey) -> Option<Arc<Reaction>> {
        let removed = self
            .reactions
            .get(&key.message_id)?
            .remove_where(|r| r.matches(&key.message_id, &key.emoji_id, &key.sender_id))
            .into_iter()
            .next();
        prune(&self.reactions, &key.message_id);
        removed
    }

    // ----- games -----

    pub fn game(&self, id: i64) -> Option<Arc<Game>> {
        self.games.find(|game| game.id() == id)
    }

    pub fn game_with(&self, payload: &Value) -> Result<Arc<Game>, PayloadError> {
        let candidate = Game::build(payload)?;
        let id = candidate.id();
        let (game, created) = self
            .games
            .find_or_insert_with(|game| game.id() == id, || Ok::<_, PayloadError>(Arc::new(candidate)))?;
        if !created {
            game.merge(payload)?;
        }
        Ok(game)
    }

    pub fn add_game(&self, game: &Arc<Game>) {
        self.games.push(game);
    }

    /// Fetch the game list and merge every entry into the cache.
    pub fn load_games(&self) -> Result<Vec<Arc<Game>>, ApiError> {
        self.fetch_all(HttpRoute::GameList, &[])?
            .iter()
            .map(|item| self.game_with(item).map_err(ApiError::from))
            .collect()
    }

    /// Walk every page of a list route and collect its `items`.
    fn fetch_all(&self, route: HttpRoute, query: &[(&str, &str)]) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut page = 1u64;
        loop {
            let page_str = page.to_string();
            let mut params = query.to_vec();
            params.push(("page", &page_str));
            params.push(("page_size", PAGE_SIZE));

            let data = self.http.get(route, &params)?;
            let batch = match data.get("items") {
                Some(Value::Array(batch)) => batch.clone(),
                _ => Vec::new(),
            };
            let page_total = data
                .get("meta")
                .and_then(|meta| meta.get("page_total"))
                .and_then(Value::as_u64)
                .unwrap_or(1);

            let empty = batch.is_empty();
            items.extend(batch);
            if empty || page >= page_total {
                return Ok(items);
            }
            page += 1;
        }
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("users", &self.users)
            .field("guilds", &self.guilds)
            .field("channels", &self.channels)
            .field("emojis", &self.emojis)
            .field("messages", &self.messages)
            .field("role_guilds", &self.roles.len())
            .field("reaction_messages", &self.reactions.len())
            .field("games", &self.games)
            .finish()
    }
}

/// Drop the list under `key` once nothing live is left in it.
///
/// Callers must not hold a guard into `map`.
fn prune<T>(map: &DashMap<String, WeakList<T>>, key: &str) {
    map.remove_if(key, |_, list| list.is_empty());
}

/// Cache hit, or fetch + build + insert on a miss.
fn resolve<T, F>(table: &WeakTable<String, T>, id: &str, fetch: F) -> Result<Arc<T>, ApiError>
where
    T: Entity<Key = String>,
    F: FnOnce() -> Result<Value, ApiError>,
{
    if let Some(hit) = table.get(&id.to_string()) {
        debug!("{} cache hit: {}", T::KIND, id);
        return Ok(hit);
    }
    debug!("{} cache miss: {}", T::KIND, id);

    let payload = fetch()?;
    let built = Arc::new(T::build(&payload)?);
    ensure_same(id, Some(built.key().as_str()))?;
    let (entity, inserted) = table.get_or_insert(id.to_string(), built);
    if !inserted {
        // Someone else cached it meanwhile; keep their instance current.
        entity.merge(&payload)?;
    }
    Ok(entity)
}

fn merge_or_build<T>(table: &WeakTable<String, T>, id: &str, payload: &Value) -> Result<Arc<T>, PayloadError>
where
    T: Entity<Key = String>,
{
    if let Some(existing) = table.get(&id.to_string()) {
        existing.merge(payload)?;
        return Ok(existing);
    }
    let built = Arc::new(T::build(payload)?);
    let (entity, inserted) = table.get_or_insert(id.to_string(), built);
    if !inserted {
        entity.merge(payload)?;
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{self, FakeTransport};
    use serde_json::json;
    use std::time::Duration;

    fn cache_with(transport: &Arc<FakeTransport>) -> EntityCache {
        EntityCache::new(testing::request_client(Arc::clone(transport)), &CacheConfig::weak_only())
    }

    fn serve_user(transport: &FakeTransport) {
        transport.on("/v3/user/view", |request| {
            let id = testing::query_param(request, "user_id").unwrap_or_default();
            testing::ok(json!({"id": id, "username": "a", "identify_num": "0001"}))
        });
    }

    #[test]
    fn test_cold_get_fetches_once() {
        let transport = Arc::new(FakeTransport::new());
        serve_user(&transport);
        let cache = cache_with(&transport);

        let first = cache.user("U1").unwrap();
        let second = cache.user("U1").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls_to("/v3/user/view"), 1);
    }

    #[test]
    fn test_merge_preserves_identity_without_fetch() {
        let transport = Arc::new(FakeTransport::new());
        serve_user(&transport);
        let cache = cache_with(&transport);

        let fetched = cache.user("U1").unwrap();
        assert_eq!(fetched.name(), "a");

        let merged = cache.user_with("U1", &json!({"id": "U1", "username": "b"})).unwrap();

        assert!(Arc::ptr_eq(&fetched, &merged));
        assert_eq!(fetched.name(), "b");
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn test_merge_form_builds_on_miss_without_fetch() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);

        let user = cache.user_with("U9", &json!({"id": "U9", "username": "z"})).unwrap();
        assert_eq!(user.name(), "z");
        assert!(transport.calls().is_empty());
        assert!(Arc::ptr_eq(&cache.user("U9").unwrap(), &user));
    }

    #[test]
    fn test_unreferenced_entity_is_refetched() {
        let transport = Arc::new(FakeTransport::new());
        serve_user(&transport);
        let cache = cache_with(&transport);

        drop(cache.user("U1").unwrap());
        cache.user("U1").unwrap();

        assert_eq!(transport.calls_to("/v3/user/view"), 2);
    }

    #[test]
    fn test_retention_survives_drop() {
        let transport = Arc::new(FakeTransport::new());
        serve_user(&transport);
        let cache = EntityCache::new(
            testing::request_client(Arc::clone(&transport)),
            &CacheConfig::retained(Duration::from_secs(60)),
        );

        drop(cache.user("U1").unwrap());
        cache.user("U1").unwrap();

        assert_eq!(transport.calls_to("/v3/user/view"), 1);
    }

    #[test]
    fn test_removed_instance_never_returned() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/channel/view", |request| {
            let id = testing::query_param(request, "target_id").unwrap_or_default();
            testing::ok(json!({"id": id, "name": "chat", "type": 1}))
        });
        let cache = cache_with(&transport);

        let original = cache.channel("C1").unwrap();
        let removed = cache.remove_channel("C1").unwrap();
        assert!(Arc::ptr_eq(&original, &removed));

        let refetched = cache.channel("C1").unwrap();
        assert!(!Arc::ptr_eq(&original, &refetched));
        assert_eq!(transport.calls_to("/v3/channel/view"), 2);
    }

    #[test]
    fn test_fetched_entity_must_match_requested_id() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/user/view", |_| testing::ok(json!({"id": "U2", "username": "other"})));
        let cache = cache_with(&transport);

        let err = cache.user("U1").unwrap_err();
        assert!(matches!(
            err,
            ApiError::Payload(PayloadError::IdMismatch { ref expected, ref found })
                if expected == "U1" && found == "U2"
        ));

        // Nothing was cached under either id, so a later payload still builds.
        let user = cache.user_with("U1", &json!({"id": "U1", "username": "a"})).unwrap();
        assert_eq!(user.id(), "U1");
    }

    #[test]
    fn test_fetch_errors_propagate() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/user/view", |_| testing::api_error(200, 40100, "user not found"));
        let cache = cache_with(&transport);

        let err = cache.user("U404").unwrap_err();
        assert!(matches!(err, ApiError::BadResponse { code: 40100, .. }));
    }

    #[test]
    fn test_guild_access_denied_is_absent() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/guild/view", |_| testing::api_error(403, 403, "forbidden"));
        let cache = cache_with(&transport);

        assert!(cache.guild("G1").unwrap().is_none());
    }

    #[test]
    fn test_guild_other_errors_propagate() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/guild/view", |_| testing::api_error(500, 500, "boom"));
        let cache = cache_with(&transport);

        assert!(cache.guild("G1").is_err());
    }

    #[test]
    fn test_malformed_fetch_payload_is_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/guild/view", |_| testing::ok(json!({"id": "G1"})));
        let cache = cache_with(&transport);

        let err = cache.guild("G1").unwrap_err();
        assert!(matches!(err, ApiError::Payload(PayloadError::MissingField("name"))));
    }

    #[test]
    fn test_roles_are_scoped_to_guild() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);
        let g1 = cache.guild_with("G1", &json!({"id": "G1", "name": "one"})).unwrap();
        let g2 = cache.guild_with("G2", &json!({"id": "G2", "name": "two"})).unwrap();

        let role = cache.role_with(&g1, &json!({"role_id": 3, "name": "mod"})).unwrap();
        assert!(Arc::ptr_eq(&cache.role(&g1, 3).unwrap(), &role));
        assert!(cache.role(&g2, 3).is_none());

        let merged = cache.role_with(&g1, &json!({"role_id": 3, "name": "admin"})).unwrap();
        assert!(Arc::ptr_eq(&merged, &role));
        assert_eq!(role.name(), "admin");

        assert!(cache.remove_role("G1", 3).is_some());
        assert!(cache.role(&g1, 3).is_none());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_removing_guild_drops_roles() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);
        let guild = cache.guild_with("G1", &json!({"id": "G1", "name": "one"})).unwrap();
        let _role = cache.role_with(&guild, &json!({"role_id": 1, "name": "r"})).unwrap();

        cache.remove_guild("G1");
        assert!(cache.role(&guild, 1).is_none());
    }

    #[test]
    fn test_load_roles_pages() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/guild-role/list", |request| {
            let page = testing::query_param(request, "page").unwrap_or_default();
            let items = if page == "1" {
                json!([{"role_id": 1, "name": "a"}, {"role_id": 2, "name": "b"}])
            } else {
                json!([{"role_id": 3, "name": "c"}])
            };
            testing::ok(json!({"items": items, "meta": {"page": page, "page_total": 2}}))
        });
        let cache = cache_with(&transport);
        let guild = cache.guild_with("G1", &json!({"id": "G1", "name": "one"})).unwrap();

        let roles = cache.load_roles(&guild).unwrap();

        assert_eq!(roles.len(), 3);
        assert_eq!(transport.calls_to("/v3/guild-role/list"), 2);
        assert!(cache.role(&guild, 3).is_some());
    }

    #[test]
    fn test_emoji_miss_lists_guild() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/guild-emoji/list", |_| {
            testing::ok(json!({
                "items": [{"id": "G1/a", "name": "party"}, {"id": "G1/b", "name": "cake"}],
                "meta": {"page": 1, "page_total": 1}
            }))
        });
        let cache = cache_with(&transport);

        let emoji = cache.emoji("G1/b").unwrap().unwrap();
        assert_eq!(emoji.name(), "cake");
        assert!(Arc::ptr_eq(&cache.emoji("G1/b").unwrap().unwrap(), &emoji));
        assert_eq!(transport.calls_to("/v3/guild-emoji/list"), 1);

        assert!(cache.emoji("G1/zzz").unwrap().is_none());
        assert!(cache.emoji("[#128077;]").unwrap().is_none());
    }

    #[test]
    fn test_message_removal_drops_reactions() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);
        let message = cache.message_with("M1", &json!({"id": "M1", "content": "hi"})).unwrap();
        let user = cache.user_with("U1", &json!({"id": "U1", "username": "a"})).unwrap();
        let emoji = cache.emoji_with("G1/a", &json!({"id": "G1/a", "name": "party"})).unwrap();

        let reaction = cache.add_reaction(Arc::new(Reaction::new("M1", emoji, user)));
        let found = cache.reaction("M1", "G1/a", "U1").unwrap();
        assert!(Arc::ptr_eq(&found, &reaction));

        assert!(Arc::ptr_eq(&cache.remove_message("M1").unwrap(), &message));
        assert!(cache.reaction("M1", "G1/a", "U1").is_none());
        assert!(cache.cached_message("M1").is_none());
    }

    #[test]
    fn test_duplicate_reaction_returns_tracked_one() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);
        let user = cache.user_with("U1", &json!({"id": "U1", "username": "a"})).unwrap();
        let emoji = cache.emoji_with("G1/a", &json!({"id": "G1/a", "name": "party"})).unwrap();

        let first = cache.add_reaction(Arc::new(Reaction::new("M1", Arc::clone(&emoji), Arc::clone(&user))));
        let second = cache.add_reaction(Arc::new(Reaction::new("M1", emoji, user)));
        assert!(Arc::ptr_eq(&first, &second));

        assert!(cache.remove_reaction(&first.key()).is_some());
        assert!(cache.reaction("M1", "G1/a", "U1").is_none());
    }

    #[test]
    fn test_empty_reaction_lists_are_dropped() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);
        let user = cache.user_with("U1", &json!({"id": "U1", "username": "a"})).unwrap();
        let emoji = cache.emoji_with("G1/a", &json!({"id": "G1/a", "name": "party"})).unwrap();

        for i in 0..1000 {
            let message_id = format!("M{i}");
            let reaction = cache.add_reaction(Arc::new(Reaction::new(
                message_id.as_str(),
                Arc::clone(&emoji),
                Arc::clone(&user),
            )));
            assert!(cache.remove_reaction(&reaction.key()).is_some());
            assert!(cache.reaction(&message_id, "G1/a", "U1").is_none());
        }
        assert_eq!(cache.reactions.len(), 0);

        // A reaction nobody holds any more is swept on lookup.
        drop(cache.add_reaction(Arc::new(Reaction::new("M0", emoji, user))));
        assert_eq!(cache.reactions.len(), 1);
        assert!(cache.reaction("M0", "G1/a", "U1").is_none());
        assert_eq!(cache.reactions.len(), 0);
    }

    #[test]
    fn test_empty_role_lists_are_dropped() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);
        let guild = cache.guild_with("G1", &json!({"id": "G1", "name": "one"})).unwrap();

        let _role = cache.role_with(&guild, &json!({"role_id": 1, "name": "r"})).unwrap();
        assert!(cache.remove_role("G1", 1).is_some());
        assert_eq!(cache.roles.len(), 0);

        drop(cache.role_with(&guild, &json!({"role_id": 2, "name": "gone"})).unwrap());
        assert!(cache.role(&guild, 2).is_none());
        assert_eq!(cache.roles.len(), 0);
    }

    #[test]
    fn test_message_payload_with_both_id_spellings() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);

        let message = cache
            .message_with("M1", &json!({"id": "M1", "msg_id": "M1", "channel_id": "C1", "content": "a"}))
            .unwrap();
        let merged = cache
            .message_with("M1", &json!({"msg_id": "M1", "target_id": "C1", "channel_id": "C1", "content": "b"}))
            .unwrap();

        assert!(Arc::ptr_eq(&message, &merged));
        assert_eq!(message.content(), "b");
        assert_eq!(message.channel_id(), Some("C1"));
    }

    #[test]
    fn test_games_scan() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/game", |_| {
            testing::ok(json!({
                "items": [{"id": 1, "name": "chess"}, {"id": 2, "name": "go"}],
                "meta": {"page": 1, "page_total": 1}
            }))
        });
        let cache = cache_with(&transport);

        let games = cache.load_games().unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(cache.game(2).unwrap().name(), "go");
        assert!(cache.game(3).is_none());

        let updated = cache.game_with(&json!({"id": 2, "name": "weiqi"})).unwrap();
        assert!(Arc::ptr_eq(&updated, &games[1]));
        assert_eq!(games[1].name(), "weiqi");
    }

    #[test]
    fn test_me_goes_through_user_table() {
        let transport = Arc::new(FakeTransport::new());
        transport.on("/v3/user/me", |_| testing::ok(json!({"id": "BOT", "username": "bot", "bot": true})));
        let cache = cache_with(&transport);

        let me = cache.me().unwrap();
        assert!(me.is_bot());
        assert!(Arc::ptr_eq(&cache.user("BOT").unwrap(), &me));
        assert_eq!(transport.calls_to("/v3/user/view"), 0);
    }

    #[test]
    fn test_concurrent_merges_keep_one_instance() {
        let transport = Arc::new(FakeTransport::new());
        let cache = cache_with(&transport);
        let anchor = cache.user_with("U1", &json!({"id": "U1", "username": "start"})).unwrap();

        std::thread::scope(|s| {
            for i in 0..8 {
                let cache = &cache;
                s.spawn(move || {
                    for j in 0..50 {
                        let name = format!("t{i}-{j}");
                        let user = cache
                            .user_with("U1", &json!({"id": "U1", "username": name}))
                            .unwrap();
                        assert_eq!(user.id(), "U1");
                    }
                });
            }
        });

        assert!(Arc::ptr_eq(&cache.user("U1").unwrap(), &anchor));
        assert!(anchor.name().starts_with('t'));
    }
}
