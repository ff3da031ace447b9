//! Mock clock source for testing.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::{ClockError, ClockOffsetSource};

/// Mock implementation of the ClockOffsetSource trait.
///
/// Answers with scripted readings in order, then with the default offset.
/// Without a default an exhausted script fails like an unreachable server.
#[derive(Debug)]
pub struct MockClockSource {
    name: String,
    script: Arc<RwLock<VecDeque<Result<Duration, String>>>>,
    default_offset: Arc<RwLock<Option<Duration>>>,
    syncs: Arc<RwLock<u32>>,
}

impl MockClockSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Arc::new(RwLock::new(VecDeque::new())),
            default_offset: Arc::new(RwLock::new(None)),
            syncs: Arc::new(RwLock::new(0)),
        }
    }

    /// Queue a successful reading.
    pub async fn push_offset(&self, offset: Duration) {
        self.script.write().await.push_back(Ok(offset));
    }

    /// Queue a failed reading.
    pub async fn push_error(&self, reason: &str) {
        self.script.write().await.push_back(Err(reason.to_string()));
    }

    pub async fn set_default_offset(&self, offset: Duration) {
        *self.default_offset.write().await = Some(offset);
    }

    /// Number of sync calls so far.
    pub async fn sync_count(&self) -> u32 {
        *self.syncs.read().await
    }
}

#[async_trait]
impl ClockOffsetSource for MockClockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sync(&self) -> Result<Duration, ClockError> {
        *self.syncs.write().await += 1;

        let next = self.script.write().await.pop_front();
        let next = match next {
            Some(next) => next,
            None => match *self.default_offset.read().await {
                Some(offset) => Ok(offset),
                None => Err("no scripted reading".to_string()),
            },
        };

        next.map_err(|reason| ClockError::Io {
            server: self.name.clone(),
            reason,
        })
    }
}
