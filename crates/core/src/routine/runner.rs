//! Purchase routine implementation.
//!
//! Drives one purchase intent through the purchase protocol:
//! - Resolution: project metadata, token strategy and SKU (once per run)
//! - Token rounds: on start and after a bounded number of submissions
//! - Submission loop: classify each response and retry, adjust or stop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::metrics::{
    ROUTINES_RUNNING, ROUTINE_OUTCOMES, SUBMIT_ATTEMPTS, SUBMIT_DURATION, TOKEN_ROUNDS,
};
use crate::show_api::{
    BuyerPayload, OrderRequest, ShowApi, SkuEntry, SubmitOutcome, TokenRequest, TokenRound,
};
use crate::ticket::{TicketBuyer, TicketEntry};
use crate::token::TokenGenerator;

use super::config::RoutineConfig;
use super::types::{IterationOutcome, RoutineError, RoutineReport, RoutineState, RoutineStatus};

/// One purchase routine per purchase intent.
pub struct PurchaseRoutine {
    hash: String,
    ticket: TicketEntry,
    api: Arc<dyn ShowApi>,
    config: RoutineConfig,
    status: Arc<RwLock<RoutineStatus>>,
    running: Arc<AtomicBool>,
    /// Set while a worker task exists, including after stop until it exits.
    active: Arc<AtomicBool>,
    /// Set once the owner dropped the intent; the routine never starts again.
    retired: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    join: Mutex<Option<JoinHandle<RoutineState>>>,
    report_tx: Option<mpsc::Sender<RoutineReport>>,
}

impl PurchaseRoutine {
    pub fn new(ticket: TicketEntry, api: Arc<dyn ShowApi>, config: RoutineConfig) -> Self {
        let hash = ticket.content_hash();
        let status = RoutineStatus::new(
            hash.clone(),
            ticket.project_id,
            ticket.sku_id,
            ticket.screen_id,
        );
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            hash,
            ticket,
            api,
            config,
            status: Arc::new(RwLock::new(status)),
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            retired: AtomicBool::new(false),
            shutdown_tx,
            join: Mutex::new(None),
            report_tx: None,
        }
    }

    /// Send a report on this channel when the routine reaches a terminal state.
    pub fn with_report_channel(mut self, tx: mpsc::Sender<RoutineReport>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn ticket(&self) -> &TicketEntry {
        &self.ticket
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> RoutineStatus {
        let mut status = self.status.read().await.clone();
        status.running = self.is_running();
        status
    }

    /// Start the purchase loop on its own task.
    ///
    /// Returns `Ok(false)` if the routine is already running.
    pub async fn start(&self) -> Result<bool, RoutineError> {
        let mut join = self.join.lock().await;

        if self.retired.load(Ordering::SeqCst) {
            return Err(RoutineError::Retired(self.hash.clone()));
        }

        if self.running.load(Ordering::SeqCst) {
            debug!(ticket = %self.hash, "Routine already running");
            return Ok(false);
        }

        let state = self.status.read().await.state.clone();
        if state.is_terminal() {
            return Err(RoutineError::AlreadyFinished {
                hash: self.hash.clone(),
                state: state.to_string(),
            });
        }

        if self.active.load(Ordering::SeqCst) {
            return Err(RoutineError::StillStopping(self.hash.clone()));
        }

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.running.store(true, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);

        let worker = Worker {
            hash: self.hash.clone(),
            ticket: self.ticket.clone(),
            api: Arc::clone(&self.api),
            config: self.config.clone(),
            status: Arc::clone(&self.status),
            running: Arc::clone(&self.running),
            active: Arc::clone(&self.active),
            report_tx: self.report_tx.clone(),
            shutdown_rx,
            run: RunState::default(),
        };

        info!(
            ticket = %self.hash,
            project_id = self.ticket.project_id,
            sku_id = self.ticket.sku_id,
            screen_id = self.ticket.screen_id,
            buyer = %self.ticket.buyer,
            "Starting purchase routine"
        );

        *join = Some(tokio::spawn(worker.run()));
        Ok(true)
    }

    /// Request cancellation. Takes effect at the next iteration boundary or
    /// immediately if the loop is sleeping. Returns whether it was running.
    pub async fn stop(&self) -> bool {
        let _join = self.join.lock().await;
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }

        self.shutdown_tx.send_replace(true);
        info!(ticket = %self.hash, "Stopping purchase routine");
        true
    }

    /// Stop the routine for good. Any later `start` is refused, including one
    /// from a scheduler callback that was already in flight.
    pub async fn retire(&self) -> bool {
        let _join = self.join.lock().await;
        self.retired.store(true, Ordering::SeqCst);
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }

        self.shutdown_tx.send_replace(true);
        info!(ticket = %self.hash, "Retiring purchase routine");
        true
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Wait for the current run to exit and return its final state.
    /// Returns `None` if the routine was never started.
    pub async fn wait(&self) -> Option<RoutineState> {
        let join = self.join.lock().await.take()?;
        match join.await {
            Ok(state) => Some(state),
            Err(e) => {
                error!(ticket = %self.hash, error = %e, "Routine task panicked");
                Some(RoutineState::Error {
                    reason: format!("routine task failed: {}", e),
                })
            }
        }
    }
}

/// Resolved target of the intent.
struct Resolved {
    sku: SkuEntry,
    generator: TokenGenerator,
}

/// Mutable purchase state of one run, owned by the worker task.
#[derive(Default)]
struct RunState {
    resolved: Option<Resolved>,
    round: Option<TokenRound>,
    /// Submissions made on the current token round.
    submits_on_round: u32,
    buyer: Option<BuyerPayload>,
    price: i64,
}

enum BuyerResolution {
    Ready(BuyerPayload),
    Retry,
    Fatal(String),
}

struct Worker {
    hash: String,
    ticket: TicketEntry,
    api: Arc<dyn ShowApi>,
    config: RoutineConfig,
    status: Arc<RwLock<RoutineStatus>>,
    running: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    report_tx: Option<mpsc::Sender<RoutineReport>>,
    shutdown_rx: watch::Receiver<bool>,
    run: RunState,
}

impl Worker {
    async fn run(mut self) -> RoutineState {
        ROUTINES_RUNNING.inc();
        {
            let mut status = self.status.write().await;
            status.started_at = Some(Utc::now());
            status.finished_at = None;
        }

        let interval = self.config.retry_interval();
        let final_state = loop {
            if self.cancel_requested() {
                break RoutineState::Cancelled;
            }
            if self.ticket.is_expired(Utc::now()) {
                break RoutineState::Failed {
                    reason: "sale window closed".to_string(),
                };
            }

            match self.iterate().await {
                IterationOutcome::Retry => {}
                IterationOutcome::Success(order_id) => break RoutineState::Success { order_id },
                IterationOutcome::Failed(reason) => break RoutineState::Failed { reason },
                IterationOutcome::Error(reason) => break RoutineState::Error { reason },
            }

            self.set_state(RoutineState::Retrying).await;
            tokio::select! {
                _ = self.shutdown_rx.changed() => break RoutineState::Cancelled,
                _ = tokio::time::sleep(interval) => {}
            }
        };

        self.finish(final_state).await
    }

    fn cancel_requested(&self) -> bool {
        !self.running.load(Ordering::SeqCst) || *self.shutdown_rx.borrow()
    }

    async fn finish(self, state: RoutineState) -> RoutineState {
        self.running.store(false, Ordering::SeqCst);
        ROUTINES_RUNNING.dec();

        let status = {
            let mut status = self.status.write().await;
            status.state = state.clone();
            status.running = false;
            status.finished_at = Some(Utc::now());
            if let RoutineState::Success { order_id } = state {
                status.order_id = Some(order_id);
            }
            status.clone()
        };

        match &state {
            RoutineState::Success { order_id } => {
                info!(ticket = %self.hash, order_id, "Purchase succeeded")
            }
            RoutineState::Failed { reason } => {
                warn!(ticket = %self.hash, reason = %reason, "Purchase failed")
            }
            RoutineState::Error { reason } => {
                error!(ticket = %self.hash, reason = %reason, "Purchase routine error")
            }
            _ => info!(ticket = %self.hash, "Purchase routine cancelled"),
        }

        self.active.store(false, Ordering::SeqCst);

        if state.is_terminal() {
            ROUTINE_OUTCOMES.with_label_values(&[state.label()]).inc();
            if let Some(tx) = &self.report_tx {
                let report = RoutineReport {
                    hash: self.hash.clone(),
                    state: state.clone(),
                    status,
                };
                match tx.try_send(report) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(ticket = %self.hash, "Report channel full, dropping report")
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(ticket = %self.hash, "Report channel closed")
                    }
                }
            }
        }

        state
    }

    async fn set_state(&self, state: RoutineState) {
        self.status.write().await.state = state;
    }

    async fn iterate(&mut self) -> IterationOutcome {
        if self.run.resolved.is_none() {
            self.set_state(RoutineState::Resolving).await;
            match self.resolve().await {
                Ok(resolved) => {
                    self.run.price = resolved.sku.price;
                    self.status.write().await.price = Some(resolved.sku.price);
                    self.run.resolved = Some(resolved);
                }
                Err(reason) => return IterationOutcome::Error(reason),
            }
        }

        let needs_round = match &self.run.round {
            None => true,
            Some(_) => self.run.submits_on_round >= self.config.token_refresh_after,
        };
        if needs_round && !self.acquire_tokens().await {
            return IterationOutcome::Retry;
        }

        let buyer = match self.resolve_buyer().await {
            BuyerResolution::Ready(buyer) => buyer,
            BuyerResolution::Retry => return IterationOutcome::Retry,
            BuyerResolution::Fatal(reason) => return IterationOutcome::Error(reason),
        };

        self.set_state(RoutineState::Submitting).await;
        self.submit(buyer).await
    }

    /// Fetch project metadata and locate the intent's SKU. Failures here
    /// are not retried.
    async fn resolve(&self) -> Result<Resolved, String> {
        let project_id = self.ticket.project_id;

        let info = self
            .api
            .fetch_project_info(project_id)
            .await
            .map_err(|e| format!("failed to fetch project {}: {}", project_id, e))?;

        if !info.needs_contact_buyer && !self.ticket.buyer.is_real_name() {
            return Err(format!(
                "project {} requires a real-name buyer",
                project_id
            ));
        }

        let skus = self
            .api
            .fetch_sku_list(project_id)
            .await
            .map_err(|e| format!("failed to fetch SKUs of project {}: {}", project_id, e))?;

        let sku = skus
            .into_iter()
            .find(|s| s.sku_id == self.ticket.sku_id && s.screen_id == self.ticket.screen_id)
            .ok_or_else(|| {
                format!(
                    "SKU {} in screen {} not found in project {}",
                    self.ticket.sku_id, self.ticket.screen_id, project_id
                )
            })?;

        if !sku.is_on_sale() {
            debug!(
                ticket = %self.hash,
                flag = sku.sale_flag.number,
                flag_name = %sku.sale_flag.display_name,
                "SKU not on sale yet"
            );
        }

        info!(
            ticket = %self.hash,
            project = %info.name,
            guarded = info.is_guarded,
            price = sku.price,
            "Intent resolved"
        );

        Ok(Resolved {
            sku,
            generator: TokenGenerator::for_project(info.is_guarded),
        })
    }

    /// Run one purchase-token round. Returns whether tokens were acquired.
    async fn acquire_tokens(&mut self) -> bool {
        let Some(resolved) = self.run.resolved.as_mut() else {
            return false;
        };

        let anchor = Instant::now();
        let anchor_at = Utc::now();
        let request = TokenRequest {
            project_id: self.ticket.project_id,
            screen_id: resolved.sku.screen_id,
            sku_id: resolved.sku.sku_id,
            guarded: resolved.generator.is_guarded(),
            prepare_token: resolved.generator.prepare_stage_token(),
        };

        match self.api.acquire_purchase_token(&request).await {
            Ok(tokens) => {
                self.run.round = Some(TokenRound {
                    tokens,
                    anchor,
                    anchor_at,
                });
                self.run.submits_on_round = 0;
                TOKEN_ROUNDS.with_label_values(&["success"]).inc();
                {
                    let mut status = self.status.write().await;
                    status.token_rounds += 1;
                    status.state = RoutineState::TokenAcquired;
                }
                debug!(ticket = %self.hash, "Purchase tokens acquired");
                true
            }
            Err(e) => {
                TOKEN_ROUNDS.with_label_values(&["failed"]).inc();
                warn!(ticket = %self.hash, error = %e, "Failed to acquire purchase tokens");
                false
            }
        }
    }

    async fn resolve_buyer(&mut self) -> BuyerResolution {
        if let Some(buyer) = &self.run.buyer {
            return BuyerResolution::Ready(buyer.clone());
        }

        let buyer = match &self.ticket.buyer {
            TicketBuyer::Ordinary { name, tel } => BuyerPayload::Contact {
                name: name.clone(),
                tel: tel.clone(),
            },
            TicketBuyer::ForceRealName { buyer_id, .. } => {
                let Some(round) = &self.run.round else {
                    return BuyerResolution::Retry;
                };
                let buyers = match self
                    .api
                    .fetch_confirm_buyers(&round.tokens, self.ticket.project_id)
                    .await
                {
                    Ok(buyers) => buyers,
                    Err(e) => {
                        warn!(ticket = %self.hash, error = %e, "Failed to fetch confirm info");
                        return BuyerResolution::Retry;
                    }
                };
                match buyers.into_iter().find(|b| b.buyer_id == *buyer_id) {
                    Some(found) => BuyerPayload::RealName(found),
                    None => {
                        return BuyerResolution::Fatal(format!(
                            "buyer {} not found in project {}",
                            buyer_id, self.ticket.project_id
                        ))
                    }
                }
            }
        };

        self.run.buyer = Some(buyer.clone());
        BuyerResolution::Ready(buyer)
    }

    async fn submit(&mut self, buyer: BuyerPayload) -> IterationOutcome {
        let (Some(resolved), Some(round)) = (self.run.resolved.as_mut(), self.run.round.as_ref())
        else {
            return IterationOutcome::Retry;
        };

        let guarded = resolved.generator.is_guarded();
        let request = OrderRequest {
            project_id: self.ticket.project_id,
            screen_id: resolved.sku.screen_id,
            sku_id: resolved.sku.sku_id,
            price: self.run.price,
            tokens: round.tokens.clone(),
            buyer,
            anchor: round.anchor_at,
            guarded,
            create_token: resolved.generator.create_stage_token(round.anchor),
        };

        self.run.submits_on_round += 1;
        self.status.write().await.attempts += 1;

        let timer = SUBMIT_DURATION.with_label_values(&[]).start_timer();
        let result = self.api.submit_order(&request).await;
        timer.observe_duration();

        match result {
            Ok(outcome) => self.classify(outcome).await,
            Err(e) => {
                SUBMIT_ATTEMPTS.with_label_values(&["error"]).inc();
                warn!(ticket = %self.hash, error = %e, "Order submission failed");
                IterationOutcome::Retry
            }
        }
    }

    /// Force a token round before the next submission.
    fn expire_round(&mut self) {
        self.run.submits_on_round = self.config.token_refresh_after;
    }

    async fn classify(&mut self, outcome: SubmitOutcome) -> IterationOutcome {
        {
            let mut status = self.status.write().await;
            status.last_code = Some(outcome.code);
            status.last_message = Some(outcome.message.clone());
        }

        if self.config.is_accepted(outcome.code) {
            if let Some(order_id) = outcome.order_id() {
                SUBMIT_ATTEMPTS.with_label_values(&["success"]).inc();
                return IterationOutcome::Success(order_id);
            }
            // accepted without an order id; needs a human to look at it
            SUBMIT_ATTEMPTS.with_label_values(&["ambiguous"]).inc();
            self.status.write().await.ambiguous_acceptances += 1;
            warn!(
                ticket = %self.hash,
                code = outcome.code,
                message = %outcome.message,
                "Accepted code without order id, refreshing tokens and retrying"
            );
            self.expire_round();
            return IterationOutcome::Retry;
        }

        if outcome.code == self.config.price_mismatch_code {
            SUBMIT_ATTEMPTS.with_label_values(&["price_mismatch"]).inc();
            match outcome.corrected_price().filter(|p| *p > 0) {
                Some(price) => {
                    info!(
                        ticket = %self.hash,
                        old_price = self.run.price,
                        new_price = price,
                        "Price corrected"
                    );
                    self.run.price = price;
                    self.status.write().await.price = Some(price);
                }
                None => warn!(ticket = %self.hash, "Price mismatch without a corrected price"),
            }
            return IterationOutcome::Retry;
        }

        if self.config.is_not_sellable(outcome.code) {
            SUBMIT_ATTEMPTS.with_label_values(&["not_sellable"]).inc();
            return IterationOutcome::Failed(format!("{} ({})", outcome.message, outcome.code));
        }

        SUBMIT_ATTEMPTS.with_label_values(&["retry"]).inc();
        if outcome.order.is_none() {
            // no order payload at all: the token round was rejected
            self.expire_round();
        }
        info!(
            ticket = %self.hash,
            code = outcome.code,
            message = %outcome.message,
            "Order not accepted, retrying"
        );
        IterationOutcome::Retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show_api::OrderPayload;
    use crate::testing::{fixtures, MockShowApi};

    fn routine(api: Arc<MockShowApi>) -> PurchaseRoutine {
        PurchaseRoutine::new(fixtures::ordinary_ticket(), api, RoutineConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        let routine = routine(api.clone());

        assert!(routine.start().await.unwrap());
        assert!(!routine.start().await.unwrap());
        assert!(routine.is_running());

        routine.stop().await;
        routine.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_sku_is_error() {
        let api = Arc::new(MockShowApi::new());
        api.set_project(fixtures::plain_project()).await;
        api.set_skus(Vec::new()).await;
        let routine = routine(api.clone());

        routine.start().await.unwrap();
        let state = routine.wait().await.unwrap();

        assert!(matches!(state, RoutineState::Error { .. }));
        assert_eq!(api.submit_calls().await.len(), 0);
        assert!(!routine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_terminal_fails() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        api.push_submit(Ok(fixtures::accepted(1))).await;
        let routine = routine(api.clone());

        routine.start().await.unwrap();
        routine.wait().await;

        assert!(matches!(
            routine.start().await,
            Err(RoutineError::AlreadyFinished { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_without_order_id_is_ambiguous() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        api.push_submit(Ok(SubmitOutcome {
            code: 100048,
            message: "in progress".to_string(),
            order: Some(OrderPayload {
                order_id: 0,
                pay_money: 100,
            }),
        }))
        .await;
        api.push_submit(Ok(fixtures::accepted(42))).await;
        let routine = routine(api.clone());

        routine.start().await.unwrap();
        let state = routine.wait().await.unwrap();

        assert_eq!(state, RoutineState::Success { order_id: 42 });
        let status = routine.status().await;
        assert_eq!(status.ambiguous_acceptances, 1);
        assert_eq!(status.attempts, 2);
        // ambiguous acceptance forces a fresh token round
        assert_eq!(api.token_calls().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_order_payload_refreshes_tokens() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        api.push_submit(Ok(SubmitOutcome {
            code: 100001,
            message: "busy".to_string(),
            order: None,
        }))
        .await;
        api.push_submit(Ok(fixtures::accepted(7))).await;
        let routine = routine(api.clone());

        routine.start().await.unwrap();
        routine.wait().await;

        assert_eq!(api.token_calls().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_failure_is_retried() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        api.push_token_error(crate::show_api::ShowApiError::Timeout)
            .await;
        api.push_submit(Ok(fixtures::accepted(3))).await;
        let routine = routine(api.clone());

        routine.start().await.unwrap();
        let state = routine.wait().await.unwrap();

        assert_eq!(state, RoutineState::Success { order_id: 3 });
        assert_eq!(api.token_calls().await.len(), 2);
        assert_eq!(api.submit_calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_window_fails() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        let mut ticket = fixtures::ordinary_ticket();
        ticket.sale_expire = Utc::now() - chrono::Duration::seconds(1);
        let routine = PurchaseRoutine::new(ticket, api.clone(), RoutineConfig::default());

        routine.start().await.unwrap();
        let state = routine.wait().await.unwrap();

        assert_eq!(
            state,
            RoutineState::Failed {
                reason: "sale window closed".to_string()
            }
        );
        assert_eq!(api.submit_calls().await.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_sent_on_terminal_state() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        api.push_submit(Ok(fixtures::accepted(11))).await;
        let (tx, mut rx) = mpsc::channel(4);
        let routine = routine(api).with_report_channel(tx);

        routine.start().await.unwrap();
        routine.wait().await;

        let report = rx.recv().await.unwrap();
        assert_eq!(report.hash, routine.hash());
        assert_eq!(report.state, RoutineState::Success { order_id: 11 });
        assert_eq!(report.status.order_id, Some(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retired_routine_refuses_start() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        let routine = routine(api.clone());

        assert!(!routine.retire().await);
        assert!(routine.is_retired());
        assert!(matches!(
            routine.start().await,
            Err(RoutineError::Retired(_))
        ));
        assert!(!routine.is_running());
        assert_eq!(api.token_calls().await.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retire_stops_running_routine() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        let routine = routine(api);

        routine.start().await.unwrap();
        assert!(routine.retire().await);
        assert_eq!(routine.wait().await, Some(RoutineState::Cancelled));
        assert!(matches!(
            routine.start().await,
            Err(RoutineError::Retired(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_report_channel_does_not_block_finish() {
        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        api.push_submit(Ok(fixtures::accepted(5))).await;
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(RoutineReport {
            hash: "other".to_string(),
            state: RoutineState::Cancelled,
            status: RoutineStatus::new("other".to_string(), 1, 2, 3),
        })
        .unwrap();
        let routine = routine(api).with_report_channel(tx);

        routine.start().await.unwrap();
        let state = tokio::time::timeout(std::time::Duration::from_secs(5), routine.wait())
            .await
            .expect("routine blocked on a full report channel");

        assert_eq!(state, Some(RoutineState::Success { order_id: 5 }));
        assert_eq!(rx.recv().await.unwrap().hash, "other");
        assert!(rx.try_recv().is_err());
    }
}
