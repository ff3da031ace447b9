//! Ticketing API boundary.
//!
//! The purchase routine only talks to the remote side through [`ShowApi`],
//! which makes it drivable by a scripted mock in tests.

mod http;
mod types;

pub use http::HttpShowClient;
pub use types::{
    BuyerPayload, ConfirmBuyer, OrderPayload, OrderRequest, ProjectInfo, PurchaseTokens,
    SaleFlag, ShowApiError, SkuEntry, SubmitOutcome, TokenRequest, TokenRound,
};

use async_trait::async_trait;

/// Calls the purchase routine makes against the ticketing service.
#[async_trait]
pub trait ShowApi: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn fetch_project_info(&self, project_id: i64) -> Result<ProjectInfo, ShowApiError>;

    /// All SKUs of all sessions of a project.
    async fn fetch_sku_list(&self, project_id: i64) -> Result<Vec<SkuEntry>, ShowApiError>;

    async fn acquire_purchase_token(
        &self,
        request: &TokenRequest,
    ) -> Result<PurchaseTokens, ShowApiError>;

    /// Registered buyers available for the current token round.
    async fn fetch_confirm_buyers(
        &self,
        tokens: &PurchaseTokens,
        project_id: i64,
    ) -> Result<Vec<ConfirmBuyer>, ShowApiError>;

    /// Submit an order. Non-zero business codes are returned in the outcome,
    /// not as errors.
    async fn submit_order(&self, request: &OrderRequest) -> Result<SubmitOutcome, ShowApiError>;
}
