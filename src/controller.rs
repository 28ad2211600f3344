//! Connection lifecycle shared by every channel.
//!
//! [`ConnectionController::connect`] is the single connect sequence used by
//! the game, group and joiner channels:
//!
//! 1. refuse if the channel already holds a live socket (no I/O);
//! 2. resolve the address, explicit or derived from the channel;
//! 3. reuse the cached session or acquire one, publishing `session`;
//! 4. open the transport;
//! 5. store the socket, publish the channel's connected event, then attach
//!    the channel's listeners.
//!
//! Any failure is published as `error` on the bus and also returned.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{BotError, Result};
use crate::events::{BotEvent, EventBus};
use crate::session::{Session, SessionManager};
use crate::state::{Channel, LeaveNotifier, ListenerContext};
use crate::transport::{Connection, Connector, SocketHandle};

/// Owns everything the channels share: host, session, bus and collaborators.
pub struct ConnectionController {
    hostname: String,
    sessions: SessionManager,
    bus: EventBus,
    connector: Arc<dyn Connector>,
    leave: Arc<dyn LeaveNotifier>,
}

impl ConnectionController {
    pub fn new(
        hostname: impl Into<String>,
        sessions: SessionManager,
        connector: Arc<dyn Connector>,
        leave: Arc<dyn LeaveNotifier>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            sessions,
            bus: EventBus::new(),
            connector,
            leave,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn session(&self) -> Option<&Session> {
        self.sessions.current()
    }

    pub fn sessions_mut(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Connect `channel`, to `address` or its default target.
    pub async fn connect<C: Channel>(
        &mut self,
        channel: &mut C,
        address: Option<&str>,
    ) -> Result<SocketHandle> {
        match self.try_connect(channel, address).await {
            Ok(socket) => Ok(socket),
            Err(e) => {
                debug!(channel = %C::KIND, error = %e, "connect failed");
                self.bus.publish(BotEvent::Error(e.clone()));
                Err(e)
            }
        }
    }

    async fn try_connect<C: Channel>(
        &mut self,
        channel: &mut C,
        address: Option<&str>,
    ) -> Result<SocketHandle> {
        if channel.slot().is_live() {
            return Err(BotError::AlreadyConnected(C::KIND));
        }

        let address = match address {
            Some(address) => address.to_string(),
            None => channel
                .default_address(&self.hostname)
                .ok_or(BotError::NoAddress(C::KIND))?,
        };

        let session = self.ensure_session().await?;

        debug!(channel = %C::KIND, address = %address, "opening socket");
        let Connection { socket, inbound } = self.connector.open(&address, &session).await?;

        channel.slot_mut().set_socket(socket.clone());
        info!(channel = %C::KIND, address = %address, "socket connected");
        self.bus.publish(BotEvent::Connected {
            channel: C::KIND,
            socket: socket.clone(),
        });
        channel.slot_mut().attach_listeners(inbound);

        Ok(socket)
    }

    async fn ensure_session(&mut self) -> Result<Session> {
        if let Some(session) = self.sessions.current() {
            return Ok(session.clone());
        }
        let session = self.sessions.acquire(&self.hostname).await?;
        self.bus.publish(BotEvent::Session(session.clone()));
        Ok(session)
    }

    /// Read-only view handed to listener sets.
    pub fn listener_context(&self) -> ListenerContext<'_> {
        ListenerContext {
            hostname: &self.hostname,
            session: self.sessions.current(),
            leave: self.leave.as_ref(),
        }
    }
}

impl fmt::Debug for ConnectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionController")
            .field("hostname", &self.hostname)
            .field("sessions", &self.sessions)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
