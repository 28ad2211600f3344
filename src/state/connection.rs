//! Per-channel connection state.
//!
//! Every channel holds a [`ChannelSlot`]: the socket handle once connected
//! and, after listeners are attached, the inbound event stream. The group
//! channel additionally owns a [`Heartbeat`].

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

use crate::events::EventKind;
use crate::transport::{InboundEvent, SocketHandle};

/// Default heartbeat interval (30 seconds).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Name of the keepalive message sent on the group channel.
pub const TOUCH_EVENT: &str = "touch";

/// The three connection targets a bot can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// In-match socket
    Game,
    /// Lobby socket
    Group,
    /// Matchmaking socket
    Joiner,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Group => "group",
            Self::Joiner => "joiner",
        }
    }

    /// Event published once this channel's socket is open.
    pub fn connected_event(&self) -> EventKind {
        match self {
            Self::Game => EventKind::GameConnected,
            Self::Group => EventKind::GroupConnected,
            Self::Joiner => EventKind::JoinerConnected,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Socket and listener attachment for one channel.
#[derive(Debug, Default)]
pub struct ChannelSlot {
    socket: Option<SocketHandle>,
    inbound: Option<mpsc::UnboundedReceiver<InboundEvent>>,
}

impl ChannelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current socket handle, connected or not.
    pub fn socket(&self) -> Option<&SocketHandle> {
        self.socket.as_ref()
    }

    /// Check if a socket is held and the transport reports it open.
    pub fn is_live(&self) -> bool {
        self.socket.as_ref().is_some_and(SocketHandle::is_connected)
    }

    pub(crate) fn set_socket(&mut self, socket: SocketHandle) {
        self.socket = Some(socket);
    }

    /// Start routing inbound events to this channel's listeners.
    pub(crate) fn attach_listeners(&mut self, inbound: mpsc::UnboundedReceiver<InboundEvent>) {
        self.inbound = Some(inbound);
    }

    pub(crate) fn detach_listeners(&mut self) {
        self.inbound = None;
    }

    pub fn has_listeners(&self) -> bool {
        self.inbound.is_some()
    }

    /// Wait for the next inbound event. Never resolves without listeners.
    pub(crate) async fn recv(&mut self) -> Option<InboundEvent> {
        match self.inbound.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }
}

/// Recurring keepalive task for the group channel.
///
/// Dropping the handle cancels the task.
pub struct Heartbeat {
    task: Option<JoinHandle<()>>,
    period: Duration,
}

impl Heartbeat {
    /// Send one touch now and schedule another every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(socket: SocketHandle, location: String, period: Duration) -> Self {
        socket.emit(TOUCH_EVENT, Value::String(location.clone()));

        let first = Instant::now() + period;
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            loop {
                ticker.tick().await;
                if !socket.is_connected() {
                    debug!("heartbeat stopping, socket closed");
                    break;
                }
                socket.emit(TOUCH_EVENT, Value::String(location.clone()));
            }
        });

        debug!(period_secs = period.as_secs(), "heartbeat started");
        Self {
            task: Some(task),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Check if the recurring task is still scheduled.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the recurring task. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("heartbeat cancelled");
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heartbeat")
            .field("period", &self.period)
            .field("running", &self.is_running())
            .finish()
    }
}
