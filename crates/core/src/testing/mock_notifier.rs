//! Mock notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{Notifier, NotifyError};

/// A delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNotification {
    pub title: String,
    pub message: String,
}

/// Mock implementation of the Notifier trait.
///
/// Records every delivered message. A configured error fails the next
/// delivery only.
#[derive(Debug, Default)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<RecordedNotification>>>,
    next_error: Arc<RwLock<Option<NotifyError>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the next delivery to fail with the given error.
    pub async fn set_next_error(&self, error: NotifyError) {
        *self.next_error.write().await = Some(error);
    }

    /// Notifications delivered so far.
    pub async fn sent(&self) -> Vec<RecordedNotification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        self.sent.write().await.push(RecordedNotification {
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
