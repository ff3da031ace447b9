//! Types exchanged with the ticketing API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Errors returned by ticketing API calls.
#[derive(Debug, Error)]
pub enum ShowApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Project metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectInfo {
    pub project_id: i64,
    pub name: String,
    /// Whether purchases need interaction tokens.
    pub is_guarded: bool,
    /// Whether orders carry a contact buyer instead of a registered one.
    pub needs_contact_buyer: bool,
    pub sale_start: Option<DateTime<Utc>>,
    pub sale_end: Option<DateTime<Utc>>,
}

/// Sale flag attached to a SKU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleFlag {
    pub number: i64,
    pub display_name: String,
}

/// Sale flag numbers that mean the SKU cannot be bought right now.
const NOT_ON_SALE_FLAGS: [i64; 3] = [3, 4, 5];

/// One purchasable variant of a project in one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkuEntry {
    pub screen_id: i64,
    pub sku_id: i64,
    pub name: String,
    pub desc: String,
    /// Price in the smallest currency unit.
    pub price: i64,
    pub sale_flag: SaleFlag,
    pub sale_start: Option<DateTime<Utc>>,
    pub sale_end: Option<DateTime<Utc>>,
}

impl SkuEntry {
    /// Whether the SKU is currently sellable (sold out, closed and
    /// unavailable flags are not).
    pub fn is_on_sale(&self) -> bool {
        !NOT_ON_SALE_FLAGS.contains(&self.sale_flag.number)
    }
}

/// Token pair returned by a purchase-token round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseTokens {
    pub request_token: String,
    pub p_token: String,
    pub gaia_token: Option<String>,
}

/// Tokens plus the instant their round began.
#[derive(Debug, Clone)]
pub struct TokenRound {
    pub tokens: PurchaseTokens,
    /// Monotonic anchor for the create-stage token.
    pub anchor: Instant,
    /// Wall-clock anchor sent with the order.
    pub anchor_at: DateTime<Utc>,
}

/// A registered buyer as listed by the confirm step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmBuyer {
    pub buyer_id: i64,
    pub name: String,
    #[serde(default)]
    pub tel: String,
    #[serde(default)]
    pub personal_id: String,
    /// Full record as returned, echoed back on submission.
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Buyer payload attached to an order.
#[derive(Debug, Clone, PartialEq)]
pub enum BuyerPayload {
    Contact { name: String, tel: String },
    RealName(ConfirmBuyer),
}

/// Purchase-token request.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub project_id: i64,
    pub screen_id: i64,
    pub sku_id: i64,
    pub guarded: bool,
    /// Prepare-stage interaction token; empty for plain projects.
    pub prepare_token: String,
}

/// Order submission.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub project_id: i64,
    pub screen_id: i64,
    pub sku_id: i64,
    pub price: i64,
    pub tokens: PurchaseTokens,
    pub buyer: BuyerPayload,
    /// Wall-clock time the token round began.
    pub anchor: DateTime<Utc>,
    pub guarded: bool,
    /// Create-stage interaction token; empty for plain projects.
    pub create_token: String,
}

/// Order payload of a submission response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    #[serde(default)]
    pub order_id: i64,
    #[serde(default)]
    pub pay_money: i64,
}

/// Result of an order submission, returned for classification by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub code: i64,
    pub message: String,
    pub order: Option<OrderPayload>,
}

impl SubmitOutcome {
    pub fn order_id(&self) -> Option<i64> {
        self.order.map(|o| o.order_id).filter(|id| *id != 0)
    }

    /// Price reported by the server, used on price-mismatch codes.
    pub fn corrected_price(&self) -> Option<i64> {
        self.order.map(|o| o.pay_money)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku(flag: i64) -> SkuEntry {
        SkuEntry {
            screen_id: 1,
            sku_id: 2,
            name: "Day 1".to_string(),
            desc: String::new(),
            price: 100,
            sale_flag: SaleFlag {
                number: flag,
                display_name: String::new(),
            },
            sale_start: None,
            sale_end: None,
        }
    }

    #[test]
    fn test_is_on_sale() {
        assert!(sku(2).is_on_sale());
        assert!(sku(1).is_on_sale());
        assert!(!sku(3).is_on_sale());
        assert!(!sku(4).is_on_sale());
        assert!(!sku(5).is_on_sale());
    }

    #[test]
    fn test_submit_outcome_order_id() {
        let outcome = SubmitOutcome {
            code: 0,
            message: String::new(),
            order: Some(OrderPayload {
                order_id: 0,
                pay_money: 100,
            }),
        };
        assert_eq!(outcome.order_id(), None);
        assert_eq!(outcome.corrected_price(), Some(100));

        let outcome = SubmitOutcome {
            code: 0,
            message: String::new(),
            order: Some(OrderPayload {
                order_id: 999,
                pay_money: 100,
            }),
        };
        assert_eq!(outcome.order_id(), Some(999));
    }
}
