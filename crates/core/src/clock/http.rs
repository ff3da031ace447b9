//! Platform timestamp endpoint as a clock source.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{ClockError, ClockOffsetSource};

#[derive(Debug, Deserialize)]
struct TimestampEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<TimestampData>,
}

#[derive(Debug, Deserialize)]
struct TimestampData {
    /// Unix milliseconds on the authority.
    microtime: i64,
}

/// Queries an HTTP endpoint answering `{"code":0,"data":{"microtime":<ms>}}`.
///
/// The authority reading is assumed to be taken halfway through the
/// round-trip.
pub struct HttpClockSource {
    client: Client,
    url: String,
}

impl HttpClockSource {
    pub fn new(url: impl Into<String>, timeout: StdDuration) -> Result<Self, ClockError> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClockError::Io {
                server: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, url })
    }
}

/// Offset from an authority reading bracketed by two local readings.
pub(crate) fn offset_from_reading(
    authority_ms: i64,
    sent_at: DateTime<Utc>,
    received_at: DateTime<Utc>,
) -> Duration {
    let rtt = received_at - sent_at;
    let midpoint = sent_at + rtt / 2;
    Duration::milliseconds(authority_ms - midpoint.timestamp_millis())
}

#[async_trait]
impl ClockOffsetSource for HttpClockSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn sync(&self) -> Result<Duration, ClockError> {
        let sent_at = Utc::now();
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                ClockError::Timeout {
                    server: self.url.clone(),
                    stage: "request",
                }
            } else {
                ClockError::Io {
                    server: self.url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;
        let received_at = Utc::now();

        let envelope: TimestampEnvelope =
            response
                .json()
                .await
                .map_err(|e| ClockError::InvalidResponse {
                    server: self.url.clone(),
                    reason: e.to_string(),
                })?;

        if envelope.code != 0 {
            return Err(ClockError::InvalidResponse {
                server: self.url.clone(),
                reason: format!("code {}: {}", envelope.code, envelope.message),
            });
        }
        let data = envelope.data.ok_or_else(|| ClockError::InvalidResponse {
            server: self.url.clone(),
            reason: "missing data".to_string(),
        })?;

        Ok(offset_from_reading(data.microtime, sent_at, received_at))
    }
}
