//! Gotify push backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::GotifyConfig;

use super::{Notifier, NotifyError};

#[derive(Debug, Serialize)]
struct GotifyMessage<'a> {
    title: &'a str,
    message: &'a str,
    priority: u8,
}

/// Sends notifications to a Gotify server.
pub struct GotifyNotifier {
    client: Client,
    config: GotifyConfig,
}

impl GotifyNotifier {
    pub fn new(config: GotifyConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn message_url(&self) -> String {
        format!("{}/message", self.config.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Notifier for GotifyNotifier {
    fn name(&self) -> &str {
        "gotify"
    }

    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let body = GotifyMessage {
            title,
            message,
            priority: self.config.priority,
        };

        let response = self
            .client
            .post(self.message_url())
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        debug!(title, "Gotify notification delivered");
        Ok(())
    }
}
