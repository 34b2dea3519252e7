//! Platform account.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use super::{Entity, Mergeable, ensure_same, lenient_bool, lenient_string, parse};
use crate::error::PayloadError;

/// Account status code meaning "banned".
const STATUS_BANNED: i64 = 10;

#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    username: Option<String>,
    nickname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    identify_num: Option<String>,
    avatar: Option<String>,
    vip_avatar: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    bot: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    online: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    is_vip: Option<bool>,
    status: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub name: String,
    pub nickname: Option<String>,
    pub identify_num: String,
    pub avatar_url: String,
    pub vip_avatar_url: String,
    pub bot: bool,
    pub online: bool,
    pub vip: bool,
    pub banned: bool,
}

impl UserState {
    fn apply(&mut self, payload: UserPayload) {
        if let Some(name) = payload.username {
            self.name = name;
        }
        if payload.nickname.is_some() {
            self.nickname = payload.nickname;
        }
        if let Some(identify_num) = payload.identify_num {
            self.identify_num = identify_num;
        }
        if let Some(avatar) = payload.avatar {
            self.avatar_url = avatar;
        }
        if let Some(vip_avatar) = payload.vip_avatar {
            self.vip_avatar_url = vip_avatar;
        }
        if let Some(bot) = payload.bot {
            self.bot = bot;
        }
        if let Some(online) = payload.online {
            self.online = online;
        }
        if let Some(vip) = payload.is_vip {
            self.vip = vip;
        }
        if let Some(status) = payload.status {
            self.banned = status == STATUS_BANNED;
        }
    }
}

#[derive(Debug)]
pub struct User {
    id: String,
    state: RwLock<UserState>,
}

impl User {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    /// `name#1234` form shown by clients.
    pub fn full_name(&self) -> String {
        let state = self.state.read();
        format!("{}#{}", state.name, state.identify_num)
    }

    pub fn is_bot(&self) -> bool {
        self.state.read().bot
    }

    /// Consistent copy of every field.
    pub fn snapshot(&self) -> UserState {
        self.state.read().clone()
    }
}

impl Mergeable for User {
    fn merge(&self, payload: &Value) -> Result<(), PayloadError> {
        let payload: UserPayload = parse(payload)?;
        ensure_same(&self.id, payload.id.as_deref())?;
        self.state.write().apply(payload);
        Ok(())
    }
}

impl Entity for User {
    type Key = String;
    const KIND: &'static str = "user";

    fn key(&self) -> String {
        self.id.clone()
    }

    fn build(payload: &Value) -> Result<Self, PayloadError> {
        let payload: UserPayload = parse(payload)?;
        let id = payload.id.clone().ok_or(PayloadError::MissingField("id"))?;
        if payload.username.is_none() {
            return Err(PayloadError::MissingField("username"));
        }
        let mut state = UserState::default();
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
    fn test_build_and_partial_merge() {
        let user = User::build(&json!({
            "id": "U1",
            "username": "alice",
            "identify_num": "0420",
            "avatar": "https://img/a.png",
            "bot": false,
            "status": 0,
        }))
        .unwrap();
        assert_eq!(user.full_name(), "alice#0420");

        user.merge(&json!({"id": "U1", "username": "bob", "status": 10})).unwrap();

        let state = user.snapshot();
        assert_eq!(state.name, "bob");
        assert_eq!(state.avatar_url, "https://img/a.png");
        assert!(state.banned);
    }

    #[test]
    fn test_merge_rejects_other_id() {
        let user = User::build(&json!({"id": "U1", "username": "alice"})).unwrap();
        let err = user.merge(&json!({"id": "U2", "username": "eve"})).unwrap_err();

        assert!(matches!(err, PayloadError::IdMismatch { .. }));
        assert_eq!(user.name(), "alice");
    }

    #[test]
    fn test_build_requires_username() {
        let err = User::build(&json!({"id": "U1"})).unwrap_err();
        assert!(matches!(err, PayloadError::MissingField("username")));
    }
}
