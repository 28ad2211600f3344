//! TagPro Bot Library
//!
//! This crate keeps an automation bot connected to a TagPro host and mirrors
//! the remote state it is told about.
//!
//! # Overview
//!
//! A [`Bot`] holds up to three persistent connections:
//!
//! - **Game** - the match in progress: identity, player roster, clock, score.
//!
//! - **Group** - the pre-match lobby: members, privacy and capacity settings.
//!   A keepalive touch is sent every 30 seconds while connected, and the host
//!   is told when the bot leaves.
//!
//! - **Joiner** - matchmaking. Connected, but nothing reacts to it yet.
//!
//! All three share one session and one connect sequence
//! ([`ConnectionController`]). Lifecycle events (`error`, `session`,
//! `*-connected`) are published on an [`EventBus`].
//!
//! # Design Principles
//!
//! 1. **One live socket per channel** - connecting twice fails before any I/O.
//!
//! 2. **Listeners follow the socket** - inbound events are only processed
//!    after the channel's connected event has been published.
//!
//! 3. **No framing** - the transport is a [`Connector`] supplied by the
//!    caller; this crate only consumes named events.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagpro_bot::{Bot, BotConfig, ChannelKind, EventKind};
//!
//! let config = BotConfig::new("tagpro.example.com").with_room("r1");
//! let mut bot = Bot::new(config, Arc::new(my_connector));
//!
//! bot.on(EventKind::Error, |event| eprintln!("{:?}", event));
//! bot.connect(ChannelKind::Group, None).await?;
//!
//! while let Some(channel) = bot.next_event().await {
//!     println!("{} members", bot.group.member_count());
//! }
//! ```

pub mod bot;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod http;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use bot::Bot;
pub use config::BotConfig;
pub use controller::ConnectionController;
pub use error::{BotError, Result};
pub use events::{BotEvent, EventBus, EventKind};
pub use http::{HttpLeaveNotifier, HttpSessionProvider};
pub use session::{Session, SessionManager, SessionProvider};
pub use state::{ChannelKind, GameState, GroupState, JoinerState, LeaveNotifier, LeaveRequest};
pub use transport::{Connection, Connector, InboundEvent, OutboundMessage, SocketHandle};
