//! Guild-scoped role.
//!
//! Roles have no fetch path of their own; they are always built for an
//! already resolved guild.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use super::{Mergeable, lenient_bool, lenient_i64, parse};
use crate::error::PayloadError;

#[derive(Debug, Deserialize)]
struct RolePayload {
    #[serde(default, deserialize_with = "lenient_i64")]
    role_id: Option<i64>,
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    color: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    position: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    hoist: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    mentionable: Option<bool>,
    #[serde(default, deserialize_with = "lenient_i64")]
    permissions: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleState {
    pub name: String,
    pub color: i64,
    pub position: i64,
    pub hoist: bool,
    pub mentionable: bool,
    /// Raw permission bit set.
    pub permissions: i64,
}

impl RoleState {
    fn apply(&mut self, payload: RolePayload) {
        if let Some(name) = payload.name {
            self.name = name;
        }
        if let Some(color) = payload.color {
            self.color = color;
        }
        if let Some(position) = payload.position {
            self.position = position;
        }
        if let Some(hoist) = payload.hoist {
            self.hoist = hoist;
        }
        if let Some(mentionable) = payload.mentionable {
            self.mentionable = mentionable;
        }
        if let Some(permissions) = payload.permissions {
            self.permissions = permissions;
        }
    }
}

#[derive(Debug)]
pub struct Role {
    guild_id: String,
    id: i64,
    state: RwLock<RoleState>,
}

impl Role {
    /// Build a role belonging to `guild_id`.
    pub fn build(guild_id: &str, payload: &Value) -> Result<Self, PayloadError> {
        let payload: RolePayload = parse(payload)?;
        let id = payload.role_id.ok_or(PayloadError::MissingField("role_id"))?;
        let mut state = RoleState::default();
        state.apply(payload);
        Ok(Self {
            guild_id: guild_id.to_string(),
            id,
            state: RwLock::new(state),
        })
    }

    /// Role id as carried by a payload, if any.
    pub fn id_of(payload: &Value) -> Option<i64> {
        match payload.get("role_id")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn snapshot(&self) -> RoleState {
        self.state.read().clone()
    }
}

impl Mergeable for Role {
    fn merge(&self, payload: &Value) -> Result<(), PayloadError> {
        let payload: RolePayload = parse(payload)?;
        if let Some(found) = payload.role_id
            && found != self.id
        {
            return Err(PayloadError::IdMismatch {
                expected: self.id.to_string(),
                found: found.to_string(),
            });
        }
        self.state.write().apply(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_and_merge() {
        let role = Role::build(
            "G1",
            &json!({"role_id": 7, "name": "mod", "hoist": 1, "permissions": 8}),
        )
        .unwrap();
        assert_eq!(role.guild_id(), "G1");
        assert_eq!(role.id(), 7);
        assert!(role.snapshot().hoist);

        role.merge(&json!({"role_id": 7, "name": "admin", "mentionable": 1})).unwrap();
        let state = role.snapshot();
        assert_eq!(state.name, "admin");
        assert!(state.mentionable);
        assert_eq!(state.permissions, 8);

        assert!(role.merge(&json!({"role_id": 8, "name": "x"})).is_err());
        assert_eq!(Role::id_of(&json!({"role_id": "12"})), Some(12));
    }
}
