//! Matchmaking channel.
//!
//! Only the connection plumbing lives here; nothing reacts to matchmaking
//! events yet, so inbound events are drained and ignored.

use tracing::trace;

use super::connection::{ChannelKind, ChannelSlot};
use super::lobby::GROUP_PORT;
use super::{Channel, ListenerContext};
use crate::transport::InboundEvent;

/// Joiner channel state.
#[derive(Debug, Default)]
pub struct JoinerState {
    slot: ChannelSlot,
}

impl JoinerState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Channel for JoinerState {
    const KIND: ChannelKind = ChannelKind::Joiner;

    fn slot(&self) -> &ChannelSlot {
        &self.slot
    }

    fn slot_mut(&mut self) -> &mut ChannelSlot {
        &mut self.slot
    }

    fn default_address(&self, hostname: &str) -> Option<String> {
        Some(format!("{}:{}/games/find", hostname, GROUP_PORT))
    }

    fn handle_event(&mut self, _ctx: &ListenerContext<'_>, event: InboundEvent) {
        trace!(event = %event.name, "joiner event ignored");
    }
}
