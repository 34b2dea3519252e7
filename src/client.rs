//! Client - one authenticated identity with its own buckets, cache and
//! event path.

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheConfig, EntityCache};
use crate::config::Config;
use crate::entity::{Channel, CustomEmoji, Game, Guild, Message, Reaction, Role, User};
use crate::error::ApiError;
use crate::events::UpdateCoordinator;
use crate::network::{
    ClientId, HttpTransport, RateLimitSwitch, RequestClient, SleepUntilReset, UreqTransport, WaitPolicy,
};

pub struct Client {
    id: ClientId,
    http: Arc<RequestClient>,
    cache: Arc<EntityCache>,
    coordinator: UpdateCoordinator,
    policy: Option<Arc<SleepUntilReset>>,
}

impl Client {
    /// Client talking to the configured API over HTTP.
    pub fn new(config: &Config) -> Self {
        Self::with_transport(config, Arc::new(UreqTransport::new()))
    }

    /// Client over an arbitrary transport.
    ///
    /// Honors `disable_rate_limit` on the process-wide switch.
    pub fn with_transport(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        let switch = RateLimitSwitch::global();
        apply_rate_limit_opt_out(config, switch);

        let id = ClientId::next();
        let policy = Arc::new(SleepUntilReset::new(config.rate_limit_margin));
        let http = RequestClient::new(id, &config.base_url, &config.bot_token, transport)
            .with_policy(Arc::clone(&policy) as Arc<dyn WaitPolicy>)
            .with_low_water(config.rate_limit_low_water);

        let mut client = Self::from_request_client(Arc::new(http), &CacheConfig::from_config(config));
        client.policy = Some(policy);
        info!(
            "Client {} ready (api: {}, throttling: {})",
            id,
            config.base_url,
            if switch.is_disabled() { "off" } else { "on" }
        );
        client
    }

    /// Client around an already configured request client.
    pub fn from_request_client(http: Arc<RequestClient>, cache_config: &CacheConfig) -> Self {
        let cache = Arc::new(EntityCache::new(Arc::clone(&http), cache_config));
        Self {
            id: http.id(),
            coordinator: UpdateCoordinator::new(Arc::clone(&cache)),
            http,
            cache,
            policy: None,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn http(&self) -> &Arc<RequestClient> {
        &self.http
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn coordinator(&self) -> &UpdateCoordinator {
        &self.coordinator
    }

    /// Wake every caller currently blocked on an exhausted bucket.
    pub fn interrupt_waits(&self) {
        if let Some(policy) = &self.policy {
            policy.interrupter().interrupt();
        }
    }

    /// The account behind the token.
    pub fn me(&self) -> Result<Arc<User>, ApiError> {
        self.cache.me()
    }

    pub fn get_user(&self, id: &str) -> Result<Arc<User>, ApiError> {
        self.cache.user(id)
    }

    pub fn get_guild(&self, id: &str) -> Result<Option<Arc<Guild>>, ApiError> {
        self.cache.guild(id)
    }

    pub fn get_channel(&self, id: &str) -> Result<Arc<Channel>, ApiError> {
        self.cache.channel(id)
    }

    pub fn get_role(&self, guild: &Guild, id: i64) -> Option<Arc<Role>> {
        self.cache.role(guild, id)
    }

    pub fn get_emoji(&self, id: &str) -> Result<Option<Arc<CustomEmoji>>, ApiError> {
        self.cache.emoji(id)
    }

    pub fn get_message(&self, id: &str) -> Result<Arc<Message>, ApiError> {
        self.cache.message(id)
    }

    pub fn get_reaction(&self, message_id: &str, emoji_id: &str, sender_id: &str) -> Option<Arc<Reaction>> {
        self.cache.reaction(message_id, emoji_id, sender_id)
    }

    pub fn get_game(&self, id: i64) -> Option<Arc<Game>> {
        self.cache.game(id)
    }
}

/// Only ever switches throttling off; a config that keeps it on leaves an
/// earlier opt-out in place.
fn apply_rate_limit_opt_out(config: &Config, switch: &RateLimitSwitch) {
    if config.disable_rate_limit {
        switch.set_disabled(true);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.http.buckets().forget(self.id);
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("http", &self.http)
            .field("cache", &self.cache)
            .finish()
    }
}
