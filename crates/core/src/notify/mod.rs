//! Outcome notifications.
//!
//! Delivery is best-effort: callers log failures and move on.

mod gotify;

pub use gotify::GotifyNotifier;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{NotifyBackend, NotifyConfig};

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    RequestFailed(String),

    #[error("Notification rejected with HTTP {0}")]
    Rejected(u16),

    #[error("Notifier not configured: {0}")]
    NotConfigured(String),
}

/// Push-notification backend.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Backend name for logging and metrics.
    fn name(&self) -> &str;

    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;

    /// Send a test message.
    async fn test(&self) -> Result<(), NotifyError> {
        self.notify("presale", "This is a test message from presale.")
            .await
    }
}

/// Notifier that drops every message.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    fn name(&self) -> &str {
        "none"
    }

    async fn notify(&self, _title: &str, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Build the notifier selected by configuration.
pub fn create_notifier(config: &NotifyConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.backend {
        NotifyBackend::None => Ok(Arc::new(NoopNotifier)),
        NotifyBackend::Gotify => {
            let gotify = config.gotify.as_ref().ok_or_else(|| {
                NotifyError::NotConfigured("[notify.gotify] section missing".to_string())
            })?;
            Ok(Arc::new(GotifyNotifier::new(gotify.clone())?))
        }
    }
}
