//! In-match player records.
//!
//! The game server pushes partial player updates: each carries an `id` and
//! only the attributes that changed. Records are created on first sight and
//! merged attribute by attribute, never replaced.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Normalized identifier for players and members.
///
/// The server sends ids as numbers or strings; `5` and `"5"` are the same id.
pub type EntityId = String;

/// Field carrying the entity id in player and member payloads.
pub const ID_FIELD: &str = "id";

/// Normalize a JSON id into an [`EntityId`].
pub fn entity_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Attribute map for one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PlayerRecord {
    attributes: Map<String, Value>,
}

impl PlayerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attributes.get(attr)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Overwrite each attribute present in `update`, except the id.
    /// Attributes absent from `update` are left untouched.
    pub fn merge(&mut self, update: &Map<String, Value>) {
        for (attr, value) in update {
            if attr == ID_FIELD {
                continue;
            }
            self.attributes.insert(attr.clone(), value.clone());
        }
    }
}

/// All players seen in the current match, by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerRoster {
    players: HashMap<EntityId, PlayerRecord>,
}

impl PlayerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one partial update, creating the record if needed.
    ///
    /// Returns the updated id, or `None` when the update has no usable id.
    pub fn apply_update(&mut self, update: &Map<String, Value>) -> Option<EntityId> {
        let id = update.get(ID_FIELD).and_then(entity_id)?;
        self.players.entry(id.clone()).or_default().merge(update);
        Some(id)
    }

    pub fn get(&self, id: &str) -> Option<&PlayerRecord> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &PlayerRecord)> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}
