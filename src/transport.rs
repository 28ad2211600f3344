//! Transport seam.
//!
//! The bot never frames bytes itself. A [`Connector`] opens a persistent
//! connection and hands back a [`Connection`]: a [`SocketHandle`] used to
//! emit named events and query liveness, plus the stream of named
//! [`InboundEvent`]s the server pushes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Result;
use crate::session::Session;

/// A named event delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub name: String,
    pub payload: Value,
}

impl InboundEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Work queued by a [`SocketHandle`] for the transport to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Emit { name: String, payload: Value },
    Close,
}

struct SocketShared {
    address: String,
    connected: AtomicBool,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
}

/// Cheaply cloneable handle to an open transport connection.
#[derive(Clone)]
pub struct SocketHandle {
    inner: Arc<SocketShared>,
}

impl SocketHandle {
    /// Create a handle for a freshly opened connection.
    ///
    /// Transports keep the receiving half of `outbound` and write whatever
    /// arrives on it to the wire.
    pub fn new(address: impl Into<String>, outbound: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self {
            inner: Arc::new(SocketShared {
                address: address.into(),
                connected: AtomicBool::new(true),
                outbound,
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Check if the transport still reports the connection as open.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire) && !self.inner.outbound.is_closed()
    }

    /// Queue a named event for the server. Dropped silently once closed.
    pub fn emit(&self, name: &str, payload: Value) {
        if !self.is_connected() {
            trace!(address = %self.address(), event = name, "emit on closed socket ignored");
            return;
        }
        let _ = self.inner.outbound.send(OutboundMessage::Emit {
            name: name.to_string(),
            payload,
        });
    }

    /// Close the connection from our side. Idempotent.
    pub fn disconnect(&self) {
        if self.inner.connected.swap(false, Ordering::AcqRel) {
            let _ = self.inner.outbound.send(OutboundMessage::Close);
        }
    }

    /// Record that the remote end went away. Called by transports.
    pub fn mark_disconnected(&self) {
        self.inner.connected.store(false, Ordering::Release);
    }

    /// Whether two handles refer to the same connection.
    pub fn same_socket(&self, other: &SocketHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle")
            .field("address", &self.address())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// An open connection as returned by a [`Connector`].
#[derive(Debug)]
pub struct Connection {
    pub socket: SocketHandle,
    pub inbound: mpsc::UnboundedReceiver<InboundEvent>,
}

/// Opens persistent connections that carry named events.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `address`, authenticating with `session`.
    ///
    /// Failures must be reported as [`BotError::Socket`](crate::BotError::Socket).
    async fn open(&self, address: &str, session: &Session) -> Result<Connection>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emit_queues_message() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let socket = SocketHandle::new("h:81/groups/r1", tx);

        socket.emit("touch", json!("page"));

        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundMessage::Emit {
                name: "touch".into(),
                payload: json!("page")
            }
        );
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let socket = SocketHandle::new("h:81/games/find", tx);

        socket.disconnect();
        socket.disconnect();

        assert!(!socket.is_connected());
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::Close);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_after_close_is_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let socket = SocketHandle::new("h:3000", tx);

        socket.mark_disconnected();
        socket.emit("touch", json!("page"));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_transport_reads_as_disconnected() {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = SocketHandle::new("h:3000", tx);
        drop(rx);

        assert!(!socket.is_connected());
    }
}
