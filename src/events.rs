//! Bot-wide publish/subscribe surface.
//!
//! Code outside the bot observes connection lifecycle through the
//! [`EventBus`]: synchronous handlers registered per [`EventKind`], or a
//! broadcast receiver of every event for async consumers.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::error::BotError;
use crate::session::Session;
use crate::state::ChannelKind;
use crate::transport::SocketHandle;

/// Capacity of the broadcast channel behind [`EventBus::subscribe`].
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Names of the events the bot publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Error,
    Session,
    GameConnected,
    GroupConnected,
    JoinerConnected,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Session => "session",
            Self::GameConnected => "game-connected",
            Self::GroupConnected => "group-connected",
            Self::JoinerConnected => "joiner-connected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event published on the bus.
#[derive(Debug, Clone)]
pub enum BotEvent {
    Error(BotError),
    Session(Session),
    Connected {
        channel: ChannelKind,
        socket: SocketHandle,
    },
}

impl BotEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Error(_) => EventKind::Error,
            Self::Session(_) => EventKind::Session,
            Self::Connected { channel, .. } => channel.connected_event(),
        }
    }
}

type Handler = Box<dyn Fn(&BotEvent) + Send + Sync>;

/// Publish/subscribe hub owned by the bot.
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Handler>>,
    tx: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            handlers: HashMap::new(),
            tx,
        }
    }

    /// Register a handler for one kind of event.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&BotEvent) + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Receive every published event.
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }

    /// Deliver an event to its handlers and to all subscribers.
    ///
    /// An error nobody observes is only visible in the logs.
    pub fn publish(&self, event: BotEvent) {
        let kind = event.kind();
        let handlers = self.handlers.get(&kind).map(Vec::as_slice).unwrap_or_default();

        if let BotEvent::Error(err) = &event {
            if handlers.is_empty() && self.tx.receiver_count() == 0 {
                warn!(error = %err, "unhandled bot error");
            }
        }

        trace!(event = %kind, handlers = handlers.len(), "publish");
        for handler in handlers {
            handler(&event);
        }
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self.handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus")
            .field("handlers", &counts)
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}
