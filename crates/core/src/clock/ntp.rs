//! SNTP clock source.

use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::{ClockError, ClockOffsetSource};

const NTP_PACKET_LEN: usize = 48;
/// Seconds between 1900-01-01 and 1970-01-01.
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;
/// Byte offsets of the server receive and transmit timestamps.
const RECEIVE_TS_AT: usize = 32;
const TRANSMIT_TS_AT: usize = 40;

/// Queries one NTP server with a single client-mode packet.
pub struct NtpClockSource {
    server: String,
    timeout: StdDuration,
}

impl NtpClockSource {
    pub fn new(server: impl Into<String>, timeout: StdDuration) -> Self {
        Self {
            server: server.into(),
            timeout,
        }
    }

    fn timed_out(&self, stage: &'static str) -> ClockError {
        ClockError::Timeout {
            server: self.server.clone(),
            stage,
        }
    }

    fn io(&self, e: std::io::Error) -> ClockError {
        ClockError::Io {
            server: self.server.clone(),
            reason: e.to_string(),
        }
    }
}

fn invalid(server: &str, reason: String) -> ClockError {
    ClockError::InvalidResponse {
        server: server.to_string(),
        reason,
    }
}

/// Unix milliseconds of the 64-bit NTP timestamp starting at `at`.
fn timestamp_ms(server: &str, resp: &[u8], at: usize) -> Result<i64, ClockError> {
    let seconds =
        u32::from_be_bytes([resp[at], resp[at + 1], resp[at + 2], resp[at + 3]]) as u64;
    let fraction =
        u32::from_be_bytes([resp[at + 4], resp[at + 5], resp[at + 6], resp[at + 7]]) as u64;
    if seconds < NTP_UNIX_OFFSET_SECS {
        return Err(invalid(
            server,
            format!("timestamp before unix epoch: {}", seconds),
        ));
    }

    let unix_secs = (seconds - NTP_UNIX_OFFSET_SECS) as i64;
    let frac_ms = ((fraction * 1_000) >> 32) as i64;
    Ok(unix_secs * 1_000 + frac_ms)
}

/// Server receive and transmit times of an NTP response, in unix milliseconds.
pub(crate) fn server_times_ms(server: &str, resp: &[u8]) -> Result<(i64, i64), ClockError> {
    if resp.len() < NTP_PACKET_LEN {
        return Err(invalid(server, format!("short packet: {} bytes", resp.len())));
    }
    let received = timestamp_ms(server, resp, RECEIVE_TS_AT)?;
    let transmitted = timestamp_ms(server, resp, TRANSMIT_TS_AT)?;
    Ok((received, transmitted))
}

/// Clock offset from the four exchange timestamps: local send `t0`, server
/// receive `t1`, server transmit `t2` and local receive `t3`.
pub(crate) fn exchange_offset_ms(t0: i64, t1: i64, t2: i64, t3: i64) -> i64 {
    ((t1 - t0) + (t2 - t3)) / 2
}

fn local_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl ClockOffsetSource for NtpClockSource {
    fn name(&self) -> &str {
        &self.server
    }

    async fn sync(&self) -> Result<Duration, ClockError> {
        let socket = timeout(self.timeout, UdpSocket::bind("0.0.0.0:0"))
            .await
            .map_err(|_| self.timed_out("bind"))?
            .map_err(|e| self.io(e))?;
        timeout(self.timeout, socket.connect(&self.server))
            .await
            .map_err(|_| self.timed_out("connect"))?
            .map_err(|e| self.io(e))?;

        let mut req = [0u8; NTP_PACKET_LEN];
        // LI=0, VN=3, Mode=3 (client)
        req[0] = 0x1b;
        let sent_at = local_now_ms();
        timeout(self.timeout, socket.send(&req))
            .await
            .map_err(|_| self.timed_out("send"))?
            .map_err(|e| self.io(e))?;

        let mut resp = [0u8; NTP_PACKET_LEN];
        let read = timeout(self.timeout, socket.recv(&mut resp))
            .await
            .map_err(|_| self.timed_out("recv"))?
            .map_err(|e| self.io(e))?;
        let received_at = local_now_ms();

        let (server_rx, server_tx) = server_times_ms(&self.server, &resp[..read])?;
        Ok(Duration::milliseconds(exchange_offset_ms(
            sent_at, server_rx, server_tx, received_at,
        )))
    }
}
