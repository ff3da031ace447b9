//! Clock offset against an external time authority.
//!
//! Sources report `authority_now - local_now`. [`ClockSync`] polls a source
//! periodically and pushes the result into the scheduler.

mod http;
mod ntp;
mod sync;

pub use http::HttpClockSource;
pub use ntp::NtpClockSource;
pub use sync::{ClockReading, ClockSync};

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ClockConfig;

/// Errors from a clock query.
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Clock query to {server} timed out during {stage}")]
    Timeout { server: String, stage: &'static str },

    #[error("Clock query to {server} failed: {reason}")]
    Io { server: String, reason: String },

    #[error("Invalid response from {server}: {reason}")]
    InvalidResponse { server: String, reason: String },

    #[error("All clock sources failed: {0}")]
    AllFailed(String),

    #[error("No clock source configured")]
    NoSources,
}

/// A time authority.
#[async_trait]
pub trait ClockOffsetSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Query the authority and return `authority_now - local_now`.
    async fn sync(&self) -> Result<Duration, ClockError>;
}

/// Tries sources in order; the first success wins.
pub struct ChainedClockSource {
    sources: Vec<Arc<dyn ClockOffsetSource>>,
}

impl ChainedClockSource {
    pub fn new(sources: Vec<Arc<dyn ClockOffsetSource>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl ClockOffsetSource for ChainedClockSource {
    fn name(&self) -> &str {
        "chain"
    }

    async fn sync(&self) -> Result<Duration, ClockError> {
        if self.sources.is_empty() {
            return Err(ClockError::NoSources);
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match source.sync().await {
                Ok(offset) => {
                    debug!(
                        source = source.name(),
                        offset_ms = offset.num_milliseconds(),
                        "Clock source answered"
                    );
                    return Ok(offset);
                }
                Err(e) => failures.push(format!("{}: {}", source.name(), e)),
            }
        }

        Err(ClockError::AllFailed(failures.join(" | ")))
    }
}

/// Build the clock source chain from configuration: the HTTP authority
/// first when configured, then NTP servers in order.
pub fn create_clock_source(config: &ClockConfig) -> Result<ChainedClockSource, ClockError> {
    let timeout = StdDuration::from_millis(config.timeout_ms);
    let mut sources: Vec<Arc<dyn ClockOffsetSource>> = Vec::new();

    if let Some(url) = &config.authority_url {
        sources.push(Arc::new(HttpClockSource::new(url.clone(), timeout)?));
    }
    for server in &config.ntp_servers {
        sources.push(Arc::new(NtpClockSource::new(server.clone(), timeout)));
    }

    if sources.is_empty() {
        return Err(ClockError::NoSources);
    }
    Ok(ChainedClockSource::new(sources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockClockSource;

    #[tokio::test]
    async fn test_chain_first_success_wins() {
        let failing = Arc::new(MockClockSource::new("a"));
        failing.push_error("down").await;
        let working = Arc::new(MockClockSource::new("b"));
        working.push_offset(Duration::milliseconds(250)).await;

        let chain = ChainedClockSource::new(vec![failing.clone(), working.clone()]);
        let offset = chain.sync().await.unwrap();

        assert_eq!(offset, Duration::milliseconds(250));
        assert_eq!(failing.sync_count().await, 1);
        assert_eq!(working.sync_count().await, 1);
    }

    #[tokio::test]
    async fn test_chain_all_failed() {
        let a = Arc::new(MockClockSource::new("a"));
        a.push_error("down").await;
        let chain = ChainedClockSource::new(vec![a]);

        match chain.sync().await {
            Err(ClockError::AllFailed(msg)) => assert!(msg.contains("a:")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = ChainedClockSource::new(Vec::new());
        assert!(matches!(chain.sync().await, Err(ClockError::NoSources)));
    }

    #[test]
    fn test_create_clock_source_from_config() {
        let mut config = ClockConfig::default();
        config.authority_url = Some("https://time.example.com/ts".to_string());
        let chain = create_clock_source(&config).unwrap();
        assert_eq!(chain.len(), 2);

        config.authority_url = None;
        config.ntp_servers.clear();
        assert!(matches!(
            create_clock_source(&config),
            Err(ClockError::NoSources)
        ));
    }
}
