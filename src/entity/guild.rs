//! Community ("guild").

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use super::{Entity, Mergeable, ensure_same, lenient_bool, lenient_i64, lenient_string, parse};
use crate::error::PayloadError;

#[derive(Debug, Deserialize)]
struct GuildPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    name: Option<String>,
    topic: Option<String>,
    icon: Option<String>,
    region: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    master_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    enable_open: Option<bool>,
    #[serde(default, deserialize_with = "lenient_i64")]
    notify_type: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildState {
    pub name: String,
    pub topic: String,
    pub icon_url: String,
    pub region: String,
    pub master_id: String,
    pub public: bool,
    pub notify_type: i64,
}

impl GuildState {
    fn apply(&mut self, payload: GuildPayload) {
        if let Some(name) = payload.name {
            self.name = name;
        }
        if let Some(topic) = payload.topic {
            self.topic = topic;
        }
        if let Some(icon) = payload.icon {
            self.icon_url = icon;
        }
        if let Some(region) = payload.region {
            self.region = region;
        }
        if let Some(master_id) = payload.master_id {
            self.master_id = master_id;
        }
        if let Some(public) = payload.enable_open {
            self.public = public;
        }
        if let Some(notify_type) = payload.notify_type {
            self.notify_type = notify_type;
        }
    }
}

#[derive(Debug)]
pub struct Guild {
    id: String,
    state: RwLock<GuildState>,
}

impl Guild {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn master_id(&self) -> String {
        self.state.read().master_id.clone()
    }

    pub fn snapshot(&self) -> GuildState {
        self.state.read().clone()
    }
}

impl Mergeable for Guild {
    fn merge(&self, payload: &Value) -> Result<(), PayloadError> {
        let payload: GuildPayload = parse(payload)?;
        ensure_same(&self.id, payload.id.as_deref())?;
        self.state.write().apply(payload);
        Ok(())
    }
}

impl Entity for Guild {
    type Key = String;
    const KIND: &'static str = "guild";

    fn key(&self) -> String {
        self.id.clone()
    }

    fn build(payload: &Value) -> Result<Self, PayloadError> {
        let payload: GuildPayload = parse(payload)?;
        let id = payload.id.clone().ok_or(PayloadError::MissingField("id"))?;
        if payload.name.is_none() {
            return Err(PayloadError::MissingField("name"));
        }
        let mut state = GuildState::default();
        state.apply(payload);
        Ok(Self {
            id,
            state: RwLock::new(state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_and_merge() {
        let guild = Guild::build(&json!({
            "id": "G1",
            "name": "rustaceans",
            "master_id": 1001,
            "enable_open": 1,
            "region": "beijing",
        }))
        .unwrap();
        assert_eq!(guild.master_id(), "1001");
        assert!(guild.snapshot().public);

        guild.merge(&json!({"id": "G1", "name": "crabs", "enable_open": false})).unwrap();
        let state = guild.snapshot();
        assert_eq!(state.name, "crabs");
        assert!(!state.public);
        assert_eq!(state.region, "beijing");
    }
}
