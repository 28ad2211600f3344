//! Session acquisition and caching.
//!
//! All three channels authenticate with the same session token. The
//! [`SessionManager`] acquires it once through a [`SessionProvider`] and
//! hands out clones afterwards.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Opaque authentication token scoped to a game host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token: String,
    hostname: String,
    acquired_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            hostname: hostname.into(),
            acquired_at: Utc::now(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("hostname", &self.hostname)
            .field("acquired_at", &self.acquired_at)
            .finish_non_exhaustive()
    }
}

/// Fetches a new session from the game host.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Acquire a session for `hostname`.
    ///
    /// Failures must be reported as [`BotError::Session`](crate::BotError::Session).
    async fn acquire(&self, hostname: &str) -> Result<Session>;
}

/// Caches the single session shared by every channel.
pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
    current: Option<Session>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn SessionProvider>, initial: Option<Session>) -> Self {
        Self {
            provider,
            current: initial,
        }
    }

    /// The cached session, if one has been acquired or supplied.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Swap the cached session wholesale.
    pub fn replace(&mut self, session: Session) {
        debug!(hostname = %session.hostname(), "session replaced");
        self.current = Some(session);
    }

    /// Acquire a fresh session and cache it. Not retried on failure.
    pub async fn acquire(&mut self, hostname: &str) -> Result<Session> {
        debug!(hostname, "acquiring session");
        let session = self.provider.acquire(hostname).await?;
        info!(hostname, "session acquired");
        self.current = Some(session.clone());
        Ok(session)
    }

    /// Return the cached session, acquiring one first if needed.
    pub async fn get_session(&mut self, hostname: &str) -> Result<Session> {
        match &self.current {
            Some(session) => Ok(session.clone()),
            None => self.acquire(hostname).await,
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
