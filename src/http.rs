//! HTTP collaborators: session acquisition and the leave notification.

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use tracing::{debug, warn};

use crate::error::{BotError, Result};
use crate::session::{Session, SessionProvider};
use crate::state::lobby::SESSION_COOKIE;
use crate::state::{LeaveNotifier, LeaveRequest};

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap_or_default()
}

/// Find the session cookie among `Set-Cookie` header values.
fn session_cookie<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    values
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, token)| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Acquires a session by loading the host's front page and reading the
/// session cookie it sets.
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    client: reqwest::Client,
}

impl HttpSessionProvider {
    pub fn new() -> Self {
        Self {
            client: build_client(),
        }
    }
}

impl Default for HttpSessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    async fn acquire(&self, hostname: &str) -> Result<Session> {
        let url = format!("http://{}/", hostname);
        let response = self.client.get(&url).send().await?;

        let values = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());

        match session_cookie(values) {
            Some(token) => Ok(Session::new(token, hostname)),
            None => Err(BotError::Session(format!(
                "{} returned no {} cookie (status {})",
                url,
                SESSION_COOKIE,
                response.status()
            ))),
        }
    }
}

/// Sends the leave GET on the current tokio runtime and forgets about it.
#[derive(Debug, Clone)]
pub struct HttpLeaveNotifier {
    client: reqwest::Client,
}

impl HttpLeaveNotifier {
    pub fn new() -> Self {
        Self {
            client: build_client(),
        }
    }
}

impl Default for HttpLeaveNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaveNotifier for HttpLeaveNotifier {
    fn notify_leave(&self, request: LeaveRequest) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(url = %request.url, "no runtime, leave notification not sent");
            return;
        };

        let client = self.client.clone();
        runtime.spawn(async move {
            let result = client
                .get(&request.url)
                .header(COOKIE, request.cookie)
                .send()
                .await;
            match result {
                Ok(response) => debug!(url = %request.url, status = %response.status(), "leave sent"),
                Err(e) => debug!(url = %request.url, error = %e, "leave failed"),
            }
        });
    }
}
