//! Mini-game registered on the platform.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use super::{Entity, Mergeable, lenient_i64, parse};
use crate::error::PayloadError;

#[derive(Debug, Deserialize)]
struct GamePayload {
    #[serde(default, deserialize_with = "lenient_i64")]
    id: Option<i64>,
    name: Option<String>,
    icon: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_i64")]
    game_type: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameState {
    pub name: String,
    pub icon_url: String,
    pub game_type: i64,
}

#[derive(Debug)]
pub struct Game {
    id: i64,
    state: RwLock<GameState>,
}

impl Game {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn snapshot(&self) -> GameState {
        self.state.read().clone()
    }
}

impl Mergeable for Game {
    fn merge(&self, payload: &Value) -> Result<(), PayloadError> {
        let payload: GamePayload = parse(payload)?;
        if let Some(found) = payload.id
            && found != self.id
        {
            return Err(PayloadError::IdMismatch {
                expected: self.id.to_string(),
                found: found.to_string(),
            });
        }
        let mut state = self.state.write();
        if let Some(name) = payload.name {
            state.name = name;
        }
        if let Some(icon) = payload.icon {
            state.icon_url = icon;
        }
        if let Some(game_type) = payload.game_type {
            state.game_type = game_type;
        }
        Ok(())
    }
}

impl Entity for Game {
    type Key = i64;
    const KIND: &'static str = "game";

    fn key(&self) -> i64 {
        self.id
    }

    fn build(payload: &Value) -> Result<Self, PayloadError> {
        let parsed: GamePayload = parse(payload)?;
        let id = parsed.id.ok_or(PayloadError::MissingField("id"))?;
        let game = Self {
            id,
            state: RwLock::new(GameState::default()),
        };
        game.merge(payload)?;
        Ok(game)
    }
}
