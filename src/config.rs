//! Construction-time configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::state::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_LOCATION};

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_heartbeat_secs() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL.as_secs()
}

/// Options recognized when building a [`Bot`](crate::Bot).
///
/// # Example
///
/// ```
/// use tagpro_bot::BotConfig;
///
/// let config = BotConfig::new("tagpro.example.com").with_room("r1");
/// assert_eq!(config.location, "page");
/// assert_eq!(config.room.as_deref(), Some("r1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotConfig {
    /// Target host for every channel address
    pub hostname: String,

    /// Pre-existing session token; skips acquisition when set
    #[serde(default)]
    pub session: Option<String>,

    /// Group to join
    #[serde(default)]
    pub room: Option<String>,

    /// Location reported in keepalive touches
    #[serde(default = "default_location")]
    pub location: String,

    /// Keepalive period in seconds
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl BotConfig {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            session: None,
            room: None,
            location: default_location(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }

    /// Load from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Keepalive period. Zero is clamped to one second.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, period: Duration) -> Self {
        self.heartbeat_secs = period.as_secs().max(1);
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}
