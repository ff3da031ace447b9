//! Mock ticketing API for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::show_api::{
    ConfirmBuyer, OrderRequest, ProjectInfo, PurchaseTokens, ShowApi, ShowApiError,
    SkuEntry, SubmitOutcome, TokenRequest,
};

use super::fixtures;

/// Mock implementation of the ShowApi trait.
///
/// Provides controllable behavior for testing:
/// - Configurable project metadata, SKU list and registered buyers
/// - Scripted submission responses, consumed in order
/// - Injected token-round and confirm-info failures
/// - Recorded token and order requests for assertions
///
/// When the submission script is exhausted every submission answers with
/// [`fixtures::retryable`], so a routine keeps looping on the same round.
///
/// # Example
///
/// ```rust,ignore
/// use presale_core::testing::{fixtures, MockShowApi};
///
/// let api = MockShowApi::with_project(fixtures::plain_project());
/// api.push_submit(Ok(fixtures::price_mismatch(120))).await;
/// api.push_submit(Ok(fixtures::accepted(9001))).await;
///
/// // run a routine against it...
///
/// let orders = api.submit_calls().await;
/// assert_eq!(orders[1].price, 120);
/// ```
pub struct MockShowApi {
    project: Arc<RwLock<Option<ProjectInfo>>>,
    skus: Arc<RwLock<Vec<SkuEntry>>>,
    buyers: Arc<RwLock<Vec<ConfirmBuyer>>>,
    /// Scripted submission responses.
    submits: Arc<RwLock<VecDeque<Result<SubmitOutcome, ShowApiError>>>>,
    /// Response once the script is exhausted.
    default_submit: Arc<RwLock<SubmitOutcome>>,
    token_errors: Arc<RwLock<VecDeque<ShowApiError>>>,
    buyer_errors: Arc<RwLock<VecDeque<ShowApiError>>>,
    /// Simulated latency of each submission.
    submit_delay: Arc<RwLock<Option<Duration>>>,
    token_calls: Arc<RwLock<Vec<TokenRequest>>>,
    submit_calls: Arc<RwLock<Vec<OrderRequest>>>,
    project_fetches: AtomicU32,
    buyer_fetches: AtomicU32,
    issued: AtomicU32,
}

impl std::fmt::Debug for MockShowApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockShowApi")
            .field("project_fetches", &self.project_fetches)
            .field("issued", &self.issued)
            .finish_non_exhaustive()
    }
}

impl Default for MockShowApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockShowApi {
    /// Create a mock with no project configured.
    pub fn new() -> Self {
        Self::build(None, Vec::new())
    }

    /// Create a mock serving `project` with the SKU of
    /// [`fixtures::ordinary_ticket`] on sale.
    pub fn with_project(project: ProjectInfo) -> Self {
        let ticket = fixtures::ordinary_ticket();
        let skus = vec![fixtures::sku(ticket.sku_id, ticket.screen_id, 100)];
        Self::build(Some(project), skus)
    }

    fn build(project: Option<ProjectInfo>, skus: Vec<SkuEntry>) -> Self {
        Self {
            project: Arc::new(RwLock::new(project)),
            skus: Arc::new(RwLock::new(skus)),
            buyers: Arc::new(RwLock::new(Vec::new())),
            submits: Arc::new(RwLock::new(VecDeque::new())),
            default_submit: Arc::new(RwLock::new(fixtures::retryable())),
            token_errors: Arc::new(RwLock::new(VecDeque::new())),
            buyer_errors: Arc::new(RwLock::new(VecDeque::new())),
            submit_delay: Arc::new(RwLock::new(None)),
            token_calls: Arc::new(RwLock::new(Vec::new())),
            submit_calls: Arc::new(RwLock::new(Vec::new())),
            project_fetches: AtomicU32::new(0),
            buyer_fetches: AtomicU32::new(0),
            issued: AtomicU32::new(0),
        }
    }

    pub async fn set_project(&self, project: ProjectInfo) {
        *self.project.write().await = Some(project);
    }

    pub async fn set_skus(&self, skus: Vec<SkuEntry>) {
        *self.skus.write().await = skus;
    }

    /// Set the buyers returned by the confirm step.
    pub async fn set_buyers(&self, buyers: Vec<ConfirmBuyer>) {
        *self.buyers.write().await = buyers;
    }

    /// Queue a submission response.
    pub async fn push_submit(&self, result: Result<SubmitOutcome, ShowApiError>) {
        self.submits.write().await.push_back(result);
    }

    /// Response used once the queue is empty.
    pub async fn set_default_submit(&self, outcome: SubmitOutcome) {
        *self.default_submit.write().await = outcome;
    }

    /// Make the next token round fail.
    pub async fn push_token_error(&self, error: ShowApiError) {
        self.token_errors.write().await.push_back(error);
    }

    /// Make the next confirm-info fetch fail.
    pub async fn push_buyer_error(&self, error: ShowApiError) {
        self.buyer_errors.write().await.push_back(error);
    }

    pub async fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.write().await = Some(delay);
    }

    /// Token requests in call order.
    pub async fn token_calls(&self) -> Vec<TokenRequest> {
        self.token_calls.read().await.clone()
    }

    /// Order requests in call order.
    pub async fn submit_calls(&self) -> Vec<OrderRequest> {
        self.submit_calls.read().await.clone()
    }

    pub fn project_fetch_count(&self) -> u32 {
        self.project_fetches.load(Ordering::SeqCst)
    }

    pub fn buyer_fetch_count(&self) -> u32 {
        self.buyer_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShowApi for MockShowApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_project_info(&self, project_id: i64) -> Result<ProjectInfo, ShowApiError> {
        self.project_fetches.fetch_add(1, Ordering::SeqCst);
        match self.project.read().await.clone() {
            Some(project) if project.project_id == project_id => Ok(project),
            _ => Err(ShowApiError::Api {
                code: -404,
                message: format!("project {} not found", project_id),
            }),
        }
    }

    async fn fetch_sku_list(&self, _project_id: i64) -> Result<Vec<SkuEntry>, ShowApiError> {
        Ok(self.skus.read().await.clone())
    }

    async fn acquire_purchase_token(
        &self,
        request: &TokenRequest,
    ) -> Result<PurchaseTokens, ShowApiError> {
        self.token_calls.write().await.push(request.clone());
        if let Some(err) = self.token_errors.write().await.pop_front() {
            return Err(err);
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PurchaseTokens {
            request_token: format!("token-{}", n),
            p_token: format!("ptoken-{}", n),
            gaia_token: None,
        })
    }

    async fn fetch_confirm_buyers(
        &self,
        _tokens: &PurchaseTokens,
        _project_id: i64,
    ) -> Result<Vec<ConfirmBuyer>, ShowApiError> {
        self.buyer_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.buyer_errors.write().await.pop_front() {
            return Err(err);
        }
        Ok(self.buyers.read().await.clone())
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<SubmitOutcome, ShowApiError> {
        self.submit_calls.write().await.push(request.clone());

        let delay = *self.submit_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.submits.write().await.pop_front();
        match scripted {
            Some(result) => result,
            None => {
                let mut outcome = self.default_submit.read().await.clone();
                if let Some(order) = outcome.order.as_mut() {
                    order.pay_money = request.price;
                }
                Ok(outcome)
            }
        }
    }
}
