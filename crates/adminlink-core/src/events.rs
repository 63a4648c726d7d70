//! Process-wide authentication notifications.
//!
//! Other parts of the host application subscribe here to react when the
//! auth token is invalidated (e.g. show the login screen).

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Buffer size for the auth event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum AuthEvent {
    #[serde(rename = "tokenExpired")]
    TokenExpired,
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::TokenExpired => "tokenExpired",
        }
    }
}

/// Clone is cheap - all clones publish to the same channel.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: AuthEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!(event = event.name(), receivers, "Auth event dispatched"),
            Err(_) => debug!(event = event.name(), "Auth event dispatched with no subscribers"),
        }
    }
}
