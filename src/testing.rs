//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{BotError, Result};
use crate::session::{Session, SessionProvider};
use crate::state::{LeaveNotifier, LeaveRequest};
use crate::transport::{Connection, Connector, InboundEvent, OutboundMessage, SocketHandle};

/// Session provider returning a fixed token or a fixed failure.
pub(crate) struct MockSessionProvider {
    result: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl MockSessionProvider {
    pub(crate) fn ok(token: &str) -> Self {
        Self {
            result: Ok(token.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn acquire(&self, hostname: &str) -> Result<Session> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(token) => Ok(Session::new(token.clone(), hostname)),
            Err(message) => Err(BotError::Session(message.clone())),
        }
    }
}

/// Leave notifier that only records what it was asked to send.
#[derive(Default)]
pub(crate) struct RecordingLeaveNotifier {
    requests: Mutex<Vec<LeaveRequest>>,
}

impl RecordingLeaveNotifier {
    pub(crate) fn requests(&self) -> Vec<LeaveRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LeaveNotifier for RecordingLeaveNotifier {
    fn notify_leave(&self, request: LeaveRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

/// The server's side of a connection opened by [`MockConnector`].
pub(crate) struct RemoteEnd {
    pub(crate) address: String,
    pub(crate) session: String,
    pub(crate) socket: SocketHandle,
    pub(crate) inbound: mpsc::UnboundedSender<InboundEvent>,
    pub(crate) outbound: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl RemoteEnd {
    /// Push a named event to the bot.
    pub(crate) fn push(&self, name: &str, payload: serde_json::Value) {
        self.inbound
            .send(InboundEvent::new(name, payload))
            .unwrap();
    }

    /// Drain everything the bot emitted, returning event names.
    pub(crate) fn emitted(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(msg) = self.outbound.try_recv() {
            if let OutboundMessage::Emit { name, .. } = msg {
                names.push(name);
            }
        }
        names
    }
}

/// Connector that records every open and hands the remote ends to the test.
#[derive(Default)]
pub(crate) struct MockConnector {
    failure: Mutex<Option<String>>,
    preload: Mutex<Vec<InboundEvent>>,
    opens: AtomicUsize,
    remotes: Mutex<VecDeque<RemoteEnd>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every following open fail with a socket error.
    pub(crate) fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Queue events the server sends before the open call returns.
    pub(crate) fn preload(&self, events: Vec<InboundEvent>) {
        *self.preload.lock().unwrap() = events;
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Oldest connection not yet claimed by the test.
    pub(crate) fn take_remote(&self) -> RemoteEnd {
        self.remotes
            .lock()
            .unwrap()
            .pop_front()
            .expect("no open connection")
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, address: &str, session: &Session) -> Result<Connection> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(BotError::Socket(message));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let socket = SocketHandle::new(address, out_tx);

        for event in self.preload.lock().unwrap().drain(..) {
            in_tx.send(event).unwrap();
        }

        self.remotes.lock().unwrap().push_back(RemoteEnd {
            address: address.to_string(),
            session: session.token().to_string(),
            socket: socket.clone(),
            inbound: in_tx,
            outbound: out_rx,
        });

        Ok(Connection {
            socket,
            inbound: in_rx,
        })
    }
}
