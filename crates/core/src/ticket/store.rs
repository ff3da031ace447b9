//! Intent storage trait and types.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::ticket::TicketEntry;

/// Error type for intent store operations.
#[derive(Debug)]
pub enum TicketError {
    /// Intent not found.
    NotFound(String),
    /// Stored row could not be decoded.
    Corrupt { hash: String, reason: String },
    /// Database error.
    Database(String),
}

impl fmt::Display for TicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketError::NotFound(hash) => write!(f, "Ticket not found: {}", hash),
            TicketError::Corrupt { hash, reason } => {
                write!(f, "Stored ticket {} is corrupt: {}", hash, reason)
            }
            TicketError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for TicketError {}

/// Trait for purchase intent storage backends.
pub trait TicketStore: Send + Sync {
    /// Persist an intent. Returns `false` if an equal intent is already stored.
    fn add(&self, entry: &TicketEntry) -> Result<bool, TicketError>;

    /// Get an intent by content hash.
    fn get(&self, hash: &str) -> Result<Option<TicketEntry>, TicketError>;

    /// List intents whose window is still open at `now`, pruning expired ones.
    fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<TicketEntry>, TicketError>;

    /// Remove an intent. Returns whether it existed.
    fn remove(&self, hash: &str) -> Result<bool, TicketError>;

    /// Number of stored intents (expired included until pruned).
    fn count(&self) -> Result<i64, TicketError>;
}
