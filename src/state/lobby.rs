//! Group (lobby) state mirror.
//!
//! A group is the pre-match lobby. The bot mirrors its membership and
//! settings, keeps its seat alive with a periodic touch, and tells the host
//! it left when the socket goes away.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, trace, warn};

use super::connection::{ChannelKind, ChannelSlot, Heartbeat, DEFAULT_HEARTBEAT_INTERVAL};
use super::player::{entity_id, EntityId, ID_FIELD};
use super::{Channel, ListenerContext, PayloadError};
use crate::session::Session;
use crate::transport::InboundEvent;

/// Location reported in touches unless configured otherwise.
pub const DEFAULT_LOCATION: &str = "page";

/// Maximum players allowed until the server says otherwise.
pub const DEFAULT_MAX_PLAYERS: u32 = 12;

/// Maximum spectators allowed until the server says otherwise.
pub const DEFAULT_MAX_SPECTATORS: u32 = 6;

/// Port the group and matchmaking servers listen on.
pub const GROUP_PORT: u16 = 81;

/// Path of the leave endpoint on the game host.
pub const LEAVE_PATH: &str = "/groups/leave/";

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "tagpro";

/// Inbound event names on the group socket.
pub mod names {
    pub const SELF_IDENTITY: &str = "you";
    pub const MEMBER: &str = "member";
    pub const REMOVED: &str = "removed";
    pub const CONNECT: &str = "connect";
    pub const PRIVACY: &str = "private";
    pub const DISCONNECT: &str = "disconnect";
}

/// Full record for one group member, as last sent by the server.
pub type MemberRecord = Map<String, Value>;

/// Privacy and capacity settings, always updated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPrivacy {
    pub is_private: bool,
    pub max_spectators: u32,
    pub max_players: u32,
    pub self_assignment: bool,
}

/// A parsed group-socket event.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent {
    SelfIdentity(EntityId),
    MemberUpsert { id: EntityId, record: MemberRecord },
    MemberRemoved(EntityId),
    Connected,
    Privacy(GroupPrivacy),
    Disconnected { reason: Option<String> },
}

impl GroupEvent {
    /// Parse a named inbound event. Unknown names yield `Ok(None)`.
    pub fn parse(event: &InboundEvent) -> Result<Option<Self>, PayloadError> {
        let parsed = match event.name.as_str() {
            names::SELF_IDENTITY => GroupEvent::SelfIdentity(
                entity_id(&event.payload)
                    .ok_or_else(|| PayloadError::malformed(names::SELF_IDENTITY, "id is not a string or number"))?,
            ),
            names::MEMBER => {
                let record = event
                    .payload
                    .as_object()
                    .cloned()
                    .ok_or_else(|| PayloadError::malformed(names::MEMBER, "expected an object"))?;
                let id = record
                    .get(ID_FIELD)
                    .and_then(entity_id)
                    .ok_or_else(|| PayloadError::malformed(names::MEMBER, "missing id"))?;
                GroupEvent::MemberUpsert { id, record }
            }
            names::REMOVED => GroupEvent::MemberRemoved(
                event
                    .payload
                    .get(ID_FIELD)
                    .and_then(entity_id)
                    .ok_or_else(|| PayloadError::malformed(names::REMOVED, "missing id"))?,
            ),
            names::CONNECT => GroupEvent::Connected,
            names::PRIVACY => GroupEvent::Privacy(
                serde_json::from_value(event.payload.clone())
                    .map_err(|e| PayloadError::malformed(names::PRIVACY, e))?,
            ),
            names::DISCONNECT => GroupEvent::Disconnected {
                reason: event.payload.as_str().map(str::to_string),
            },
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }
}

/// Best-effort notice to the host that the bot left its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveRequest {
    /// Full URL of the leave endpoint
    pub url: String,

    /// `Cookie` header value carrying the session
    pub cookie: String,
}

impl LeaveRequest {
    pub fn new(hostname: &str, session: &Session) -> Self {
        Self {
            url: format!("http://{}{}", hostname, LEAVE_PATH),
            cookie: format!("{}={}", SESSION_COOKIE, session.token()),
        }
    }
}

/// Sends leave notifications without waiting for the outcome.
pub trait LeaveNotifier: Send + Sync {
    /// Fire the request. Implementations must not block and never report back.
    fn notify_leave(&self, request: LeaveRequest);
}

/// Group channel state.
#[derive(Debug)]
pub struct GroupState {
    /// Bot's group identity
    pub self_id: Option<EntityId>,

    /// Group id used to build the address
    pub room: Option<String>,

    /// Location reported in touches
    pub location: String,

    /// Is this a private group?
    pub private: bool,

    /// Maximum players allowed
    pub max_players: u32,

    /// Maximum spectators allowed
    pub max_spectators: u32,

    /// Can members self-assign?
    pub self_assignment: bool,

    /// Map, time, speed, etc.
    pub settings: Map<String, Value>,

    /// Members playing, maintained by the consumer
    pub players: HashMap<EntityId, MemberRecord>,

    /// Members spectating, maintained by the consumer
    pub spectators: HashMap<EntityId, MemberRecord>,

    /// Members waiting, maintained by the consumer
    pub waiting: HashMap<EntityId, MemberRecord>,

    /// Keepalive period
    pub heartbeat_period: Duration,

    slot: ChannelSlot,
    members: HashMap<EntityId, MemberRecord>,
    heartbeat: Option<Heartbeat>,
}

impl GroupState {
    pub fn new(room: Option<String>, location: impl Into<String>) -> Self {
        Self {
            self_id: None,
            room,
            location: location.into(),
            private: false,
            max_players: DEFAULT_MAX_PLAYERS,
            max_spectators: DEFAULT_MAX_SPECTATORS,
            self_assignment: true,
            settings: Map::new(),
            players: HashMap::new(),
            spectators: HashMap::new(),
            waiting: HashMap::new(),
            heartbeat_period: DEFAULT_HEARTBEAT_INTERVAL,
            slot: ChannelSlot::new(),
            members: HashMap::new(),
            heartbeat: None,
        }
    }

    pub fn member(&self, id: &str) -> Option<&MemberRecord> {
        self.members.get(id)
    }

    pub fn members(&self) -> impl Iterator<Item = (&EntityId, &MemberRecord)> {
        self.members.iter()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if the keepalive is scheduled.
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(Heartbeat::is_running)
    }

    /// Apply one parsed event.
    pub fn apply(&mut self, ctx: &ListenerContext<'_>, event: GroupEvent) {
        match event {
            GroupEvent::SelfIdentity(id) => {
                debug!(id = %id, "group identity");
                self.self_id = Some(id);
            }
            GroupEvent::MemberUpsert { id, record } => {
                self.members.insert(id, record);
            }
            GroupEvent::MemberRemoved(id) => {
                if self.members.remove(&id).is_none() {
                    trace!(id = %id, "removal for unknown member");
                }
            }
            GroupEvent::Connected => self.start_heartbeat(),
            GroupEvent::Privacy(privacy) => {
                self.private = privacy.is_private;
                self.max_spectators = privacy.max_spectators;
                self.max_players = privacy.max_players;
                self.self_assignment = privacy.self_assignment;
            }
            GroupEvent::Disconnected { reason } => self.leave(ctx, reason),
        }
    }

    fn start_heartbeat(&mut self) {
        // A repeated connect notice must not leave two timers running.
        self.stop_heartbeat();

        let Some(socket) = self.slot.socket().cloned() else {
            warn!("group connect notice without a socket");
            return;
        };
        self.heartbeat = Some(Heartbeat::start(
            socket,
            self.location.clone(),
            self.heartbeat_period,
        ));
    }

    fn stop_heartbeat(&mut self) {
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.cancel();
        }
    }

    fn leave(&mut self, ctx: &ListenerContext<'_>, reason: Option<String>) {
        info!(reason = reason.as_deref().unwrap_or("unknown"), "left group");

        if let Some(socket) = self.slot.socket() {
            if socket.is_connected() {
                socket.disconnect();
            }
        }
        self.stop_heartbeat();

        match ctx.session {
            Some(session) => ctx.leave.notify_leave(LeaveRequest::new(ctx.hostname, session)),
            None => debug!("no session, skipping leave notification"),
        }
    }
}

impl Channel for GroupState {
    const KIND: ChannelKind = ChannelKind::Group;

    fn slot(&self) -> &ChannelSlot {
        &self.slot
    }

    fn slot_mut(&mut self) -> &mut ChannelSlot {
        &mut self.slot
    }

    fn default_address(&self, hostname: &str) -> Option<String> {
        self.room
            .as_ref()
            .map(|room| format!("{}:{}/groups/{}", hostname, GROUP_PORT, room))
    }

    fn handle_event(&mut self, ctx: &ListenerContext<'_>, event: InboundEvent) {
        match GroupEvent::parse(&event) {
            Ok(Some(parsed)) => self.apply(ctx, parsed),
            Ok(None) => trace!(event = %event.name, "unhandled group event"),
            Err(e) => warn!(error = %e, "dropping group event"),
        }
    }
}
