//! Purchase intent types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the hex content hash used as routine/task key.
const CONTENT_HASH_LEN: usize = 16;

/// Buyer attached to a purchase intent.
///
/// The variant must match the product's buyer-verification mode: projects
/// with real-name verification need a registered buyer id, everything else
/// takes a plain contact name and phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketBuyer {
    /// Contact-only buyer.
    Ordinary { name: String, tel: String },
    /// Buyer registered on the account with verified identity.
    ForceRealName { buyer_id: i64, name: String },
}

impl TicketBuyer {
    /// Whether the buyer must be resolved against the account's buyer list.
    pub fn is_real_name(&self) -> bool {
        matches!(self, TicketBuyer::ForceRealName { .. })
    }

    /// Identity used for deduplication.
    ///
    /// Real-name buyers are identified by id only; the display name may
    /// change on the remote side without changing who the buyer is.
    /// The name is length-prefixed so a `:` inside it cannot shift the split.
    fn identity(&self) -> String {
        match self {
            TicketBuyer::Ordinary { name, tel } => {
                format!("ordinary:{}:{}:{}", name.len(), name, tel)
            }
            TicketBuyer::ForceRealName { buyer_id, .. } => format!("real_name:{}", buyer_id),
        }
    }

    /// Compare two buyers by identity.
    pub fn same_buyer(&self, other: &TicketBuyer) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Display for TicketBuyer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketBuyer::Ordinary { name, tel } => write!(f, "{} ({})", name, tel),
            TicketBuyer::ForceRealName { buyer_id, name } => {
                write!(f, "{} (ID: {})", name, buyer_id)
            }
        }
    }
}

/// A purchase intent: one ticket for one buyer in one sale window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketEntry {
    pub project_id: i64,
    pub sku_id: i64,
    pub screen_id: i64,
    /// When the sale opens (authority time).
    pub sale_start: DateTime<Utc>,
    /// When the attempt window closes.
    pub sale_expire: DateTime<Utc>,
    pub buyer: TicketBuyer,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub sku_name: String,
    #[serde(default)]
    pub screen_name: String,
}

impl TicketEntry {
    /// Stable digest identifying this intent.
    ///
    /// Covers project, sku, screen and buyer identity, so two entries hash
    /// equal exactly when they describe the same intent.
    pub fn content_hash(&self) -> String {
        let canonical = format!(
            "project:{}|sku:{}|screen:{}|buyer:{}",
            self.project_id,
            self.sku_id,
            self.screen_id,
            self.buyer.identity()
        );
        let digest = format!("{:x}", Sha256::digest(canonical.as_bytes()));
        digest[..CONTENT_HASH_LEN].to_string()
    }

    /// Whether two entries describe the same intent.
    pub fn same_intent(&self, other: &TicketEntry) -> bool {
        self.project_id == other.project_id
            && self.sku_id == other.sku_id
            && self.screen_id == other.screen_id
            && self.buyer.same_buyer(&other.buyer)
    }

    /// Whether the attempt window has closed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.sale_expire <= now
    }

    /// Short label for logs: `project-sku-screen`.
    pub fn label(&self) -> String {
        format!("{}-{}-{}", self.project_id, self.sku_id, self.screen_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(buyer: TicketBuyer) -> TicketEntry {
        let now = Utc::now();
        TicketEntry {
            project_id: 103601,
            sku_id: 55,
            screen_id: 7,
            sale_start: now,
            sale_expire: now + Duration::hours(2),
            buyer,
            project_name: String::new(),
            sku_name: String::new(),
            screen_name: String::new(),
        }
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = entry(TicketBuyer::Ordinary {
            name: "A".to_string(),
            tel: "123".to_string(),
        });
        let b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 16);
    }

    #[test]
    fn test_content_hash_ignores_window_and_names() {
        let a = entry(TicketBuyer::Ordinary {
            name: "A".to_string(),
            tel: "123".to_string(),
        });
        let mut b = a.clone();
        b.sale_start = a.sale_start + Duration::minutes(5);
        b.project_name = "Some Expo".to_string();
        assert_eq!(a.content_hash(), b.content_hash());
        assert!(a.same_intent(&b));
    }

    #[test]
    fn test_content_hash_differs_by_buyer() {
        let a = entry(TicketBuyer::Ordinary {
            name: "A".to_string(),
            tel: "123".to_string(),
        });
        let b = entry(TicketBuyer::Ordinary {
            name: "A".to_string(),
            tel: "456".to_string(),
        });
        assert_ne!(a.content_hash(), b.content_hash());
        assert!(!a.same_intent(&b));
    }

    #[test]
    fn test_separator_in_name_does_not_collide() {
        let a = entry(TicketBuyer::Ordinary {
            name: "a:b".to_string(),
            tel: "c".to_string(),
        });
        let b = entry(TicketBuyer::Ordinary {
            name: "a".to_string(),
            tel: "b:c".to_string(),
        });
        assert_ne!(a.content_hash(), b.content_hash());
        assert!(!a.same_intent(&b));
    }

    #[test]
    fn test_real_name_buyer_identity_is_id() {
        let a = TicketBuyer::ForceRealName {
            buyer_id: 42,
            name: "Old".to_string(),
        };
        let b = TicketBuyer::ForceRealName {
            buyer_id: 42,
            name: "New".to_string(),
        };
        assert!(a.same_buyer(&b));
        assert!(a.is_real_name());
    }

    #[test]
    fn test_buyer_display() {
        let ordinary = TicketBuyer::Ordinary {
            name: "A".to_string(),
            tel: "123".to_string(),
        };
        assert_eq!(ordinary.to_string(), "A (123)");

        let real = TicketBuyer::ForceRealName {
            buyer_id: 9,
            name: "B".to_string(),
        };
        assert_eq!(real.to_string(), "B (ID: 9)");
    }

    #[test]
    fn test_buyer_serialization() {
        let buyer = TicketBuyer::ForceRealName {
            buyer_id: 9,
            name: "B".to_string(),
        };
        let json = serde_json::to_string(&buyer).unwrap();
        assert!(json.contains("\"type\":\"force_real_name\""));
        let parsed: TicketBuyer = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, buyer);
    }

    #[test]
    fn test_expiry() {
        let e = entry(TicketBuyer::Ordinary {
            name: "A".to_string(),
            tel: "123".to_string(),
        });
        assert!(!e.is_expired(Utc::now()));
        assert!(e.is_expired(e.sale_expire));
        assert_eq!(e.label(), "103601-55-7");
    }
}
