//! The bot: three channels behind one connection controller.

use std::sync::Arc;

use tracing::debug;

use crate::config::BotConfig;
use crate::controller::ConnectionController;
use crate::error::Result;
use crate::events::{BotEvent, EventKind};
use crate::http::{HttpLeaveNotifier, HttpSessionProvider};
use crate::session::{Session, SessionManager, SessionProvider};
use crate::state::{
    Channel, ChannelKind, GameState, GroupState, JoinerState, LeaveNotifier,
};
use crate::transport::{Connector, SocketHandle};

/// A client bot holding the game, group and joiner channels.
///
/// All listener reactions run on whichever task drives [`Bot::next_event`];
/// the bot is never shared between tasks.
#[derive(Debug)]
pub struct Bot {
    controller: ConnectionController,

    /// In-match state
    pub game: GameState,

    /// Lobby state
    pub group: GroupState,

    /// Matchmaking state
    pub joiner: JoinerState,
}

impl Bot {
    /// Build a bot using the HTTP session provider and leave notifier.
    pub fn new(config: BotConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_collaborators(
            config,
            connector,
            Arc::new(HttpSessionProvider::new()),
            Arc::new(HttpLeaveNotifier::new()),
        )
    }

    pub fn with_collaborators(
        config: BotConfig,
        connector: Arc<dyn Connector>,
        sessions: Arc<dyn SessionProvider>,
        leave: Arc<dyn LeaveNotifier>,
    ) -> Self {
        let initial = config
            .session
            .as_ref()
            .map(|token| Session::new(token.clone(), config.hostname.clone()));

        let mut group = GroupState::new(config.room.clone(), config.location.clone());
        group.heartbeat_period = config.heartbeat_interval();

        Self {
            controller: ConnectionController::new(
                config.hostname,
                SessionManager::new(sessions, initial),
                connector,
                leave,
            ),
            game: GameState::new(),
            group,
            joiner: JoinerState::new(),
        }
    }

    pub fn hostname(&self) -> &str {
        self.controller.hostname()
    }

    /// The session shared by every channel, once known.
    pub fn session(&self) -> Option<&Session> {
        self.controller.session()
    }

    /// Swap the shared session. Open sockets keep the one they connected with.
    pub fn replace_session(&mut self, session: Session) {
        self.controller.sessions_mut().replace(session);
    }

    /// Register a handler for one kind of bot event.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&BotEvent) + Send + Sync + 'static,
    {
        self.controller.bus_mut().on(kind, handler);
    }

    /// Receive every bot event.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BotEvent> {
        self.controller.bus().subscribe()
    }

    /// Connect a channel to `address`, or to its default target.
    ///
    /// Errors are returned and also published as [`EventKind::Error`].
    pub async fn connect(
        &mut self,
        channel: ChannelKind,
        address: Option<&str>,
    ) -> Result<SocketHandle> {
        match channel {
            ChannelKind::Game => self.controller.connect(&mut self.game, address).await,
            ChannelKind::Group => self.controller.connect(&mut self.group, address).await,
            ChannelKind::Joiner => self.controller.connect(&mut self.joiner, address).await,
        }
    }

    fn has_listeners(&self) -> bool {
        self.game.slot().has_listeners()
            || self.group.slot().has_listeners()
            || self.joiner.slot().has_listeners()
    }

    /// Wait for one inbound event and run it through its channel's listeners.
    ///
    /// Returns the channel that handled it, or `None` once no channel has an
    /// open event stream.
    pub async fn next_event(&mut self) -> Option<ChannelKind> {
        loop {
            if !self.has_listeners() {
                return None;
            }

            let (kind, event) = tokio::select! {
                event = self.game.slot_mut().recv() => (ChannelKind::Game, event),
                event = self.group.slot_mut().recv() => (ChannelKind::Group, event),
                event = self.joiner.slot_mut().recv() => (ChannelKind::Joiner, event),
            };

            let Some(event) = event else {
                debug!(channel = %kind, "inbound stream closed");
                match kind {
                    ChannelKind::Game => self.game.slot_mut().detach_listeners(),
                    ChannelKind::Group => self.group.slot_mut().detach_listeners(),
                    ChannelKind::Joiner => self.joiner.slot_mut().detach_listeners(),
                }
                continue;
            };

            let ctx = self.controller.listener_context();
            match kind {
                ChannelKind::Game => self.game.handle_event(&ctx, event),
                ChannelKind::Group => self.group.handle_event(&ctx, event),
                ChannelKind::Joiner => self.joiner.handle_event(&ctx, event),
            }
            return Some(kind);
        }
    }

    /// Process inbound events until every channel's stream has closed.
    pub async fn run(&mut self) {
        while self.next_event().await.is_some() {}
        debug!("all channels closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::state::LeaveRequest;
    use crate::testing::{MockConnector, MockSessionProvider, RecordingLeaveNotifier};
    use crate::transport::InboundEvent;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Fixture {
        bot: Bot,
        connector: Arc<MockConnector>,
        provider: Arc<MockSessionProvider>,
        leave: Arc<RecordingLeaveNotifier>,
    }

    fn fixture(config: BotConfig) -> Fixture {
        let connector = Arc::new(MockConnector::new());
        let provider = Arc::new(MockSessionProvider::ok("tok"));
        let leave = Arc::new(RecordingLeaveNotifier::default());
        let bot = Bot::with_collaborators(config, connector.clone(), provider.clone(), leave.clone());
        Fixture {
            bot,
            connector,
            provider,
            leave,
        }
    }

    fn config() -> BotConfig {
        BotConfig::new("h").with_room("r1")
    }

    #[tokio::test]
    async fn test_already_connected_for_every_channel() {
        let mut f = fixture(config());
        f.bot.game.port = Some(8001);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        f.bot.on(EventKind::Error, move |event| {
            if let BotEvent::Error(e) = event {
                seen.lock().unwrap().push(e.clone());
            }
        });

        for kind in [ChannelKind::Game, ChannelKind::Group, ChannelKind::Joiner] {
            f.bot.connect(kind, None).await.unwrap();
            let opens = f.connector.open_count();

            let err = f.bot.connect(kind, None).await.unwrap_err();

            assert_eq!(err, BotError::AlreadyConnected(kind));
            assert_eq!(f.connector.open_count(), opens);
        }
        assert_eq!(errors.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_session_acquired_once_across_channels() {
        let mut f = fixture(config());
        let sessions = Arc::new(Mutex::new(0));
        let count = sessions.clone();
        f.bot.on(EventKind::Session, move |_| *count.lock().unwrap() += 1);

        f.bot.connect(ChannelKind::Group, None).await.unwrap();
        f.bot.connect(ChannelKind::Joiner, None).await.unwrap();
        f.bot.connect(ChannelKind::Game, Some("h:8002")).await.unwrap();

        assert_eq!(f.provider.calls(), 1);
        assert_eq!(*sessions.lock().unwrap(), 1);
        for _ in 0..3 {
            assert_eq!(f.connector.take_remote().session, "tok");
        }
    }

    #[tokio::test]
    async fn test_configured_session_skips_provider() {
        let mut f = fixture(config().with_session("given"));
        let mut rx = f.bot.subscribe();

        f.bot.connect(ChannelKind::Joiner, None).await.unwrap();

        assert_eq!(f.provider.calls(), 0);
        assert_eq!(f.connector.take_remote().session, "given");
        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::JoinerConnected);
    }

    #[tokio::test]
    async fn test_listeners_attach_after_connected_event() {
        let mut f = fixture(config());
        f.connector
            .preload(vec![InboundEvent::new("you", json!("early"))]);
        let mut rx = f.bot.subscribe();

        f.bot.connect(ChannelKind::Group, None).await.unwrap();

        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::Session);
        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::GroupConnected);
        assert!(f.bot.group.self_id.is_none());

        assert_eq!(f.bot.next_event().await, Some(ChannelKind::Group));
        assert_eq!(f.bot.group.self_id.as_deref(), Some("early"));
    }

    #[tokio::test]
    async fn test_game_events_dispatched() {
        let mut f = fixture(config());
        f.bot.game.port = Some(8003);
        f.bot.connect(ChannelKind::Game, None).await.unwrap();
        let remote = f.connector.take_remote();
        assert_eq!(remote.address, "h:8003");

        remote.push("id", json!(4));
        remote.push("p", json!([{"id": 4, "x": 1, "y": 2}]));
        remote.push("p", json!([{"id": 4, "y": 5}]));
        remote.push("time", json!({"time": 120000, "state": 1}));
        remote.push("score", json!({"r": 2, "b": 1}));
        for _ in 0..5 {
            assert_eq!(f.bot.next_event().await, Some(ChannelKind::Game));
        }

        assert_eq!(f.bot.game.self_id.as_deref(), Some("4"));
        let player = f.bot.game.players().get("4").unwrap();
        assert_eq!(Value::Object(player.attributes().clone()), json!({"x": 1, "y": 5}));
        assert_eq!(f.bot.game.time, 120000);
        assert_eq!(f.bot.game.state_code, 1);
        assert_eq!(f.bot.game.score.map(|s| (s.red, s.blue)), Some((2, 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_end_to_end() {
        let mut f = fixture(config());

        f.bot.connect(ChannelKind::Group, None).await.unwrap();
        let mut remote = f.connector.take_remote();
        assert_eq!(remote.address, "h:81/groups/r1");

        remote.push("connect", Value::Null);
        f.bot.next_event().await;

        assert!(f.bot.group.self_id.is_none());
        assert_eq!(remote.emitted(), vec!["touch".to_string()]);
        assert!(f.bot.group.has_heartbeat());

        remote.push("you", json!("me"));
        f.bot.next_event().await;
        assert_eq!(f.bot.group.self_id.as_deref(), Some("me"));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(remote.emitted(), vec!["touch".to_string()]);

        remote.push("disconnect", json!("transport close"));
        f.bot.next_event().await;

        assert!(!f.bot.group.has_heartbeat());
        assert!(!remote.socket.is_connected());
        assert_eq!(
            f.leave.requests(),
            vec![LeaveRequest {
                url: "http://h/groups/leave/".into(),
                cookie: "tagpro=tok".into(),
            }]
        );

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(remote.emitted().is_empty());
    }

    #[tokio::test]
    async fn test_group_reconnect_after_disconnect() {
        let mut f = fixture(config());
        f.bot.connect(ChannelKind::Group, None).await.unwrap();
        let remote = f.connector.take_remote();
        remote.push("disconnect", Value::Null);
        f.bot.next_event().await;

        f.bot.connect(ChannelKind::Group, None).await.unwrap();
        assert_eq!(f.connector.open_count(), 2);
    }

    #[tokio::test]
    async fn test_run_ends_when_streams_close() {
        let mut f = fixture(config());
        f.bot.connect(ChannelKind::Joiner, None).await.unwrap();
        let remote = f.connector.take_remote();
        remote.push("found", json!({"port": 8004}));
        drop(remote);

        f.bot.run().await;

        assert!(!f.bot.joiner.slot().has_listeners());
        assert_eq!(f.bot.next_event().await, None);
    }

    #[tokio::test]
    async fn test_replace_session_used_by_next_connect() {
        let mut f = fixture(config());
        f.bot.replace_session(Session::new("swapped", "h"));

        f.bot.connect(ChannelKind::Joiner, None).await.unwrap();

        assert_eq!(f.bot.session().unwrap().token(), "swapped");
        assert_eq!(f.connector.take_remote().session, "swapped");
        assert_eq!(f.provider.calls(), 0);
    }
}
