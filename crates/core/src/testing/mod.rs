//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits
//! (ticketing API, notifier, clock authority), so purchase routines and the
//! supervisor can be driven end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use presale_core::testing::{fixtures, MockNotifier, MockShowApi};
//!
//! let api = MockShowApi::with_project(fixtures::plain_project());
//! api.push_submit(Ok(fixtures::accepted(42))).await;
//! let notifier = MockNotifier::new();
//!
//! // Build a supervisor from them...
//! ```

mod mock_clock;
mod mock_notifier;
mod mock_show_api;

pub use mock_clock::MockClockSource;
pub use mock_notifier::{MockNotifier, RecordedNotification};
pub use mock_show_api::MockShowApi;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{Duration, Utc};

    use crate::show_api::{
        ConfirmBuyer, OrderPayload, ProjectInfo, SaleFlag, SkuEntry, SubmitOutcome,
    };
    use crate::ticket::{TicketBuyer, TicketEntry};

    pub const PROJECT_ID: i64 = 103601;
    pub const SKU_ID: i64 = 55;
    pub const SCREEN_ID: i64 = 7;

    /// Intent for an ordinary (contact) buyer with an open sale window.
    pub fn ordinary_ticket() -> TicketEntry {
        ticket(TicketBuyer::Ordinary {
            name: "A".to_string(),
            tel: "123".to_string(),
        })
    }

    /// Intent for a registered buyer.
    pub fn real_name_ticket(buyer_id: i64) -> TicketEntry {
        ticket(TicketBuyer::ForceRealName {
            buyer_id,
            name: "B".to_string(),
        })
    }

    /// Intent on the fixture project for any buyer.
    pub fn ticket(buyer: TicketBuyer) -> TicketEntry {
        let now = Utc::now();
        TicketEntry {
            project_id: PROJECT_ID,
            sku_id: SKU_ID,
            screen_id: SCREEN_ID,
            sale_start: now - Duration::minutes(1),
            sale_expire: now + Duration::days(1),
            buyer,
            project_name: "Test Show".to_string(),
            sku_name: "Standard".to_string(),
            screen_name: "Day 1".to_string(),
        }
    }

    /// Project without interaction tokens, taking contact buyers.
    pub fn plain_project() -> ProjectInfo {
        ProjectInfo {
            project_id: PROJECT_ID,
            name: "Test Show".to_string(),
            is_guarded: false,
            needs_contact_buyer: true,
            sale_start: None,
            sale_end: None,
        }
    }

    /// Project requiring interaction tokens and registered buyers.
    pub fn guarded_project() -> ProjectInfo {
        ProjectInfo {
            is_guarded: true,
            needs_contact_buyer: false,
            ..plain_project()
        }
    }

    /// On-sale SKU.
    pub fn sku(sku_id: i64, screen_id: i64, price: i64) -> SkuEntry {
        SkuEntry {
            screen_id,
            sku_id,
            name: "Standard".to_string(),
            desc: String::new(),
            price,
            sale_flag: SaleFlag {
                number: 2,
                display_name: "on sale".to_string(),
            },
            sale_start: None,
            sale_end: None,
        }
    }

    pub fn confirm_buyer(buyer_id: i64, name: &str) -> ConfirmBuyer {
        ConfirmBuyer {
            buyer_id,
            name: name.to_string(),
            tel: "13800000000".to_string(),
            personal_id: "1101**********0011".to_string(),
            raw: serde_json::json!({ "id": buyer_id, "name": name }),
        }
    }

    /// Order placed.
    pub fn accepted(order_id: i64) -> SubmitOutcome {
        SubmitOutcome {
            code: 0,
            message: "success".to_string(),
            order: Some(OrderPayload {
                order_id,
                pay_money: 100,
            }),
        }
    }

    /// Stale price; `price` is the current one.
    pub fn price_mismatch(price: i64) -> SubmitOutcome {
        SubmitOutcome {
            code: 100034,
            message: "price changed".to_string(),
            order: Some(OrderPayload {
                order_id: 0,
                pay_money: price,
            }),
        }
    }

    /// Busy answer that keeps the token round valid.
    pub fn retryable() -> SubmitOutcome {
        SubmitOutcome {
            code: 100001,
            message: "too busy".to_string(),
            order: Some(OrderPayload {
                order_id: 0,
                pay_money: 0,
            }),
        }
    }

    pub fn not_sellable() -> SubmitOutcome {
        SubmitOutcome {
            code: 100016,
            message: "project not sellable".to_string(),
            order: None,
        }
    }
}
