//! Best-effort operator notifications.
//!
//! Pushes are fire-and-forget: every message is also logged, transport
//! failures are swallowed, and missing tokens degrade to log-only mode.

use std::sync::Arc;
use tracing::{info, warn};

const PUSHOVER_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";

#[async_trait::async_trait]
pub trait Notify: Send + Sync {
    async fn send(&self, message: &str);
}

/// Pushover transport
pub struct Pushover {
    client: reqwest::Client,
    endpoint: String,
    user_token: Option<String>,
    app_token: Option<String>,
}

impl Pushover {
    pub fn new(user_token: Option<String>, app_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: PUSHOVER_ENDPOINT.to_string(),
            user_token,
            app_token,
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait::async_trait]
impl Notify for Pushover {
    async fn send(&self, message: &str) {
        info!("{message}");

        let (Some(user), Some(token)) = (&self.user_token, &self.app_token) else {
            return;
        };

        let body = serde_json::json!({
            "token": token,
            "user": user,
            "message": message,
        });
        match self.client.post(&self.endpoint).json(&body).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "push notification rejected");
            }
            Ok(_) => {}
            Err(err) => warn!("push notification failed: {err}"),
        }
    }
}

/// Shared handle the monitor, workflow and orchestrator all hold
pub type Notifier = Arc<dyn Notify>;
