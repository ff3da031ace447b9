//! Purchase routine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by all purchase routines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineConfig {
    /// Sleep between loop iterations (milliseconds).
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// Submissions on one token round before tokens are re-acquired.
    /// The remote side rejects stale tokens regardless of response code.
    #[serde(default = "default_token_refresh_after")]
    pub token_refresh_after: u32,

    /// Response codes that mean the order was taken (including
    /// "already in progress" style duplicates).
    #[serde(default = "default_accepted_codes")]
    pub accepted_codes: Vec<i64>,

    /// Response code for a stale price; the response carries the current one.
    #[serde(default = "default_price_mismatch_code")]
    pub price_mismatch_code: i64,

    /// Response codes that end the attempt as not sellable.
    #[serde(default = "default_not_sellable_codes")]
    pub not_sellable_codes: Vec<i64>,
}

fn default_retry_interval() -> u64 {
    500
}

fn default_token_refresh_after() -> u32 {
    61
}

fn default_accepted_codes() -> Vec<i64> {
    vec![0, 100048, 100079]
}

fn default_price_mismatch_code() -> i64 {
    100034
}

fn default_not_sellable_codes() -> Vec<i64> {
    vec![100016, 100017]
}

impl RoutineConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn is_accepted(&self, code: i64) -> bool {
        self.accepted_codes.contains(&code)
    }

    pub fn is_not_sellable(&self, code: i64) -> bool {
        self.not_sellable_codes.contains(&code)
    }
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval(),
            token_refresh_after: default_token_refresh_after(),
            accepted_codes: default_accepted_codes(),
            price_mismatch_code: default_price_mismatch_code(),
            not_sellable_codes: default_not_sellable_codes(),
        }
    }
}
