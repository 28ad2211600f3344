//! In-match state mirror.
//!
//! Tracks the bot's identity, the player roster, the match clock and the
//! score from events pushed by the game server. Events arrive in no
//! particular order; each field holds the most recent value seen.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use super::connection::{ChannelKind, ChannelSlot};
use super::player::{entity_id, EntityId, PlayerRoster};
use super::{Channel, ListenerContext, PayloadError};
use crate::transport::InboundEvent;

/// State code before any clock notice has arrived ("not yet connected").
///
/// The server's codes are kept opaque; consumers interpret them.
pub const DEFAULT_STATE_CODE: i64 = 4;

/// Inbound event names on the game socket.
pub mod names {
    pub const IDENTITY: &str = "id";
    pub const PLAYERS: &str = "p";
    pub const CLOCK: &str = "time";
    pub const SCORE: &str = "score";
}

/// Team score snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    #[serde(rename = "r")]
    pub red: i64,
    #[serde(rename = "b")]
    pub blue: i64,
}

#[derive(Debug, Deserialize)]
struct ClockPayload {
    time: i64,
    state: i64,
}

/// A parsed game-socket event.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Identity(EntityId),
    PlayerUpdates(Vec<Map<String, Value>>),
    Clock { time: i64, state: i64 },
    Score(Score),
}

impl GameEvent {
    /// Parse a named inbound event. Unknown names yield `Ok(None)`.
    pub fn parse(event: &InboundEvent) -> Result<Option<Self>, PayloadError> {
        let parsed = match event.name.as_str() {
            names::IDENTITY => {
                let id = entity_id(&event.payload)
                    .ok_or_else(|| PayloadError::malformed(names::IDENTITY, "id is not a string or number"))?;
                GameEvent::Identity(id)
            }
            names::PLAYERS => match &event.payload {
                Value::Null => GameEvent::PlayerUpdates(Vec::new()),
                Value::Array(items) => GameEvent::PlayerUpdates(
                    items
                        .iter()
                        .filter_map(|item| item.as_object().cloned())
                        .collect(),
                ),
                _ => return Err(PayloadError::malformed(names::PLAYERS, "expected an array")),
            },
            names::CLOCK => {
                let clock: ClockPayload = serde_json::from_value(event.payload.clone())
                    .map_err(|e| PayloadError::malformed(names::CLOCK, e))?;
                GameEvent::Clock {
                    time: clock.time,
                    state: clock.state,
                }
            }
            names::SCORE => GameEvent::Score(
                serde_json::from_value(event.payload.clone())
                    .map_err(|e| PayloadError::malformed(names::SCORE, e))?,
            ),
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }
}

/// Game channel state.
#[derive(Debug)]
pub struct GameState {
    /// Bot's game identity
    pub self_id: Option<EntityId>,

    /// Game's port number, known once a match is assigned
    pub port: Option<u16>,

    /// Current time shown on the clock
    pub time: i64,

    /// Opaque match state code
    pub state_code: i64,

    /// The map as it is known
    pub map: Option<Value>,

    /// Latest score, if any was seen
    pub score: Option<Score>,

    slot: ChannelSlot,
    players: PlayerRoster,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            self_id: None,
            port: None,
            time: 0,
            state_code: DEFAULT_STATE_CODE,
            map: None,
            score: None,
            slot: ChannelSlot::new(),
            players: PlayerRoster::new(),
        }
    }
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn players(&self) -> &PlayerRoster {
        &self.players
    }

    /// Apply one parsed event.
    pub fn apply(&mut self, event: GameEvent) {
        match event {
            GameEvent::Identity(id) => {
                debug!(id = %id, "game identity");
                self.self_id = Some(id);
            }
            GameEvent::PlayerUpdates(updates) => {
                for update in &updates {
                    if self.players.apply_update(update).is_none() {
                        warn!("player update without id skipped");
                    }
                }
            }
            GameEvent::Clock { time, state } => {
                self.time = time;
                self.state_code = state;
            }
            GameEvent::Score(score) => {
                self.score = Some(score);
            }
        }
    }
}

impl Channel for GameState {
    const KIND: ChannelKind = ChannelKind::Game;

    fn slot(&self) -> &ChannelSlot {
        &self.slot
    }

    fn slot_mut(&mut self) -> &mut ChannelSlot {
        &mut self.slot
    }

    fn default_address(&self, hostname: &str) -> Option<String> {
        self.port.map(|port| format!("{}:{}", hostname, port))
    }

    fn handle_event(&mut self, _ctx: &ListenerContext<'_>, event: InboundEvent) {
        match GameEvent::parse(&event) {
            Ok(Some(parsed)) => self.apply(parsed),
            Ok(None) => trace!(event = %event.name, "unhandled game event"),
            Err(e) => warn!(error = %e, "dropping game event"),
        }
    }
}
