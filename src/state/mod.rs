//! Channel state for the bot.
//!
//! This module provides the per-channel state mirrors and the listener sets
//! that keep them in sync with the server:
//!
//! - `connection` - Channel identity, socket slot and the group heartbeat
//! - `player` - In-match player records (attribute-level merge)
//! - `game` - Match identity, roster, clock and score
//! - `lobby` - Group membership, settings, keepalive and graceful leave
//! - `joiner` - Matchmaking connection, no listeners
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              Bot                                  │
//! │                                                                   │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐           │
//! │  │  GameState   │   │  GroupState  │   │ JoinerState  │           │
//! │  │              │   │              │   │              │           │
//! │  │ ChannelSlot  │   │ ChannelSlot  │   │ ChannelSlot  │           │
//! │  │ PlayerRoster │   │ members      │   │              │           │
//! │  │ clock, score │   │ Heartbeat    │   │              │           │
//! │  └──────▲───────┘   └──────▲───────┘   └──────▲───────┘           │
//! │         │ handle_event     │                  │                   │
//! │         └──────────────────┴──────────────────┘                   │
//! │                    next_event() dispatch                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod connection;
pub mod game;
pub mod joiner;
pub mod lobby;
pub mod player;

use std::fmt;

use thiserror::Error;

use crate::session::Session;
use crate::transport::InboundEvent;

// Re-export commonly used types
pub use connection::{ChannelKind, ChannelSlot, Heartbeat, DEFAULT_HEARTBEAT_INTERVAL, TOUCH_EVENT};
pub use game::{GameEvent, GameState, Score, DEFAULT_STATE_CODE};
pub use joiner::JoinerState;
pub use lobby::{
    GroupEvent, GroupPrivacy, GroupState, LeaveNotifier, LeaveRequest, MemberRecord,
    DEFAULT_LOCATION,
};
pub use player::{entity_id, EntityId, PlayerRecord, PlayerRoster};

/// What a listener set may read from the bot while reacting to an event.
pub struct ListenerContext<'a> {
    pub hostname: &'a str,
    pub session: Option<&'a Session>,
    pub leave: &'a dyn LeaveNotifier,
}

impl fmt::Debug for ListenerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerContext")
            .field("hostname", &self.hostname)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// A channel the connection controller can open.
///
/// Implementors supply their default address and their listener set; the
/// controller owns the connect sequence.
pub trait Channel {
    const KIND: ChannelKind;

    fn slot(&self) -> &ChannelSlot;

    fn slot_mut(&mut self) -> &mut ChannelSlot;

    /// Target address derived from the bot's hostname, if it can be built yet.
    fn default_address(&self, hostname: &str) -> Option<String>;

    /// React to one inbound event. Only called once listeners are attached.
    fn handle_event(&mut self, ctx: &ListenerContext<'_>, event: InboundEvent);
}

/// An inbound payload that does not match its event's shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {event} payload: {reason}")]
pub struct PayloadError {
    pub event: &'static str,
    pub reason: String,
}

impl PayloadError {
    pub fn malformed(event: &'static str, reason: impl fmt::Display) -> Self {
        Self {
            event,
            reason: reason.to_string(),
        }
    }
}
