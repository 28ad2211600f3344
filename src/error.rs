//! Bot error types.

use thiserror::Error;

use crate::state::ChannelKind;

/// Errors raised by the connection controller and its collaborators.
///
/// Every error is both returned to the caller and published on the bot's
/// event bus, so the type is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    /// Connect attempted while the channel already holds a live socket.
    #[error("{0} socket already connected")]
    AlreadyConnected(ChannelKind),

    /// Session acquisition failed (host unreachable, missing or invalid token).
    #[error("Session error: {0}")]
    Session(String),

    /// Transport-level connect failure.
    #[error("Socket error: {0}")]
    Socket(String),

    /// No explicit address given and the channel's default could not be derived.
    #[error("No address known for the {0} channel")]
    NoAddress(ChannelKind),
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::Session(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
