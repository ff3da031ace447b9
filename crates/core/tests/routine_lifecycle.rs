//! Purchase routine lifecycle integration tests.
//!
//! These tests drive a routine against the scripted ticketing API mock:
//! resolve -> token round -> submit loop -> terminal state

use std::sync::Arc;
use std::time::Duration;

use presale_core::{
    show_api::ShowApiError,
    testing::{fixtures, MockShowApi},
    PurchaseRoutine, RoutineConfig, RoutineState, TicketEntry,
};

fn routine(ticket: TicketEntry, api: &Arc<MockShowApi>) -> PurchaseRoutine {
    PurchaseRoutine::new(ticket, Arc::clone(api) as _, RoutineConfig::default())
}

/// Poll until the mock has seen `n` submissions.
async fn wait_for_submits(api: &MockShowApi, n: usize) -> bool {
    for _ in 0..2_000 {
        if api.submit_calls().await.len() >= n {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test(start_paused = true)]
async fn test_price_correction_then_success() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    api.push_submit(Ok(fixtures::price_mismatch(120))).await;
    api.push_submit(Ok(fixtures::accepted(999))).await;
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    let state = routine.wait().await.unwrap();

    assert_eq!(state, RoutineState::Success { order_id: 999 });
    let submits = api.submit_calls().await;
    assert_eq!(submits.len(), 2);
    assert_eq!(submits[0].price, 100);
    assert_eq!(submits[1].price, 120);
    // price correction keeps the token round
    assert_eq!(api.token_calls().await.len(), 1);
    assert_eq!(submits[0].tokens, submits[1].tokens);

    let status = routine.status().await;
    assert_eq!(status.price, Some(120));
    assert_eq!(status.order_id, Some(999));
    assert_eq!(status.attempts, 2);
    assert_eq!(status.last_code, Some(0));
    assert!(status.finished_at.is_some());
    assert!(!routine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_success_at_attempt_k_stops_submitting() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    for _ in 0..4 {
        api.push_submit(Ok(fixtures::retryable())).await;
    }
    api.push_submit(Ok(fixtures::accepted(77))).await;
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    let state = routine.wait().await.unwrap();
    assert_eq!(state, RoutineState::Success { order_id: 77 });
    assert_eq!(api.submit_calls().await.len(), 5);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.submit_calls().await.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_tokens_refreshed_after_61_submits() {
    let api = Arc::new(MockShowApi::with_project(fixtures::guarded_project()));
    api.set_buyers(vec![fixtures::confirm_buyer(7, "B")]).await;
    let routine = routine(fixtures::real_name_ticket(7), &api);

    routine.start().await.unwrap();
    assert!(wait_for_submits(&api, 63).await);
    routine.stop().await;
    routine.wait().await;

    let submits = api.submit_calls().await;
    for submit in &submits[..61] {
        assert_eq!(submit.tokens.request_token, "token-1");
    }
    assert_eq!(submits[61].tokens.request_token, "token-2");
    assert_eq!(submits[62].tokens.request_token, "token-2");

    let tokens = api.token_calls().await;
    assert!(tokens[0].guarded);
    assert!(!tokens[0].prepare_token.is_empty());
    assert!(submits.iter().all(|s| s.guarded && !s.create_token.is_empty()));
    // the registered buyer is looked up once per run
    assert_eq!(api.buyer_fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_plain_project_sends_empty_tokens() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    api.push_submit(Ok(fixtures::accepted(1))).await;
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    routine.wait().await;

    let tokens = api.token_calls().await;
    assert!(!tokens[0].guarded);
    assert!(tokens[0].prepare_token.is_empty());
    let submits = api.submit_calls().await;
    assert!(!submits[0].guarded);
    assert!(submits[0].create_token.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_sleep_prevents_next_submit() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(api.submit_calls().await.len(), 1);

    assert!(routine.stop().await);
    assert!(!routine.is_running());
    let state = routine.wait().await.unwrap();

    assert_eq!(state, RoutineState::Cancelled);
    assert_eq!(api.submit_calls().await.len(), 1);
    assert!(!routine.stop().await);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_cancel_resolves_again() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    routine.stop().await;
    routine.wait().await;

    api.push_submit(Ok(fixtures::accepted(5))).await;
    assert!(routine.start().await.unwrap());
    let state = routine.wait().await.unwrap();

    assert_eq!(state, RoutineState::Success { order_id: 5 });
    assert_eq!(api.project_fetch_count(), 2);
    assert_eq!(api.token_calls().await.len(), 2);
    assert_eq!(routine.status().await.attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_real_name_buyer_not_found_is_error() {
    let api = Arc::new(MockShowApi::with_project(fixtures::guarded_project()));
    api.set_buyers(vec![fixtures::confirm_buyer(8, "Other")]).await;
    let routine = routine(fixtures::real_name_ticket(7), &api);

    routine.start().await.unwrap();
    let state = routine.wait().await.unwrap();

    match state {
        RoutineState::Error { reason } => assert!(reason.contains("buyer 7")),
        other => panic!("unexpected state: {:?}", other),
    }
    assert_eq!(api.submit_calls().await.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_confirm_info_failure_is_retried() {
    let api = Arc::new(MockShowApi::with_project(fixtures::guarded_project()));
    api.set_buyers(vec![fixtures::confirm_buyer(7, "B")]).await;
    api.push_buyer_error(ShowApiError::Timeout).await;
    api.push_submit(Ok(fixtures::accepted(12))).await;
    let routine = routine(fixtures::real_name_ticket(7), &api);

    routine.start().await.unwrap();
    let state = routine.wait().await.unwrap();

    assert_eq!(state, RoutineState::Success { order_id: 12 });
    assert_eq!(api.buyer_fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_contact_buyer_on_real_name_project_is_error() {
    let api = Arc::new(MockShowApi::with_project(fixtures::guarded_project()));
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    let state = routine.wait().await.unwrap();

    assert!(matches!(state, RoutineState::Error { .. }));
    assert!(api.token_calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_project_is_error() {
    let api = Arc::new(MockShowApi::new());
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    let state = routine.wait().await.unwrap();

    match state {
        RoutineState::Error { reason } => assert!(reason.contains("103601")),
        other => panic!("unexpected state: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_not_sellable_is_failed() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    api.push_submit(Ok(fixtures::retryable())).await;
    api.push_submit(Ok(fixtures::not_sellable())).await;
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    let state = routine.wait().await.unwrap();

    match state {
        RoutineState::Failed { reason } => assert!(reason.contains("100016")),
        other => panic!("unexpected state: {:?}", other),
    }
    assert_eq!(api.submit_calls().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_is_retried() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    api.push_submit(Err(ShowApiError::Transport("connection reset".to_string())))
        .await;
    api.push_submit(Err(ShowApiError::Timeout)).await;
    api.push_submit(Ok(fixtures::accepted(31))).await;
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    let state = routine.wait().await.unwrap();

    assert_eq!(state, RoutineState::Success { order_id: 31 });
    assert_eq!(api.submit_calls().await.len(), 3);
    assert_eq!(api.token_calls().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submissions_are_spaced_by_retry_interval() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    let config = RoutineConfig {
        retry_interval_ms: 250,
        ..Default::default()
    };
    let routine = PurchaseRoutine::new(fixtures::ordinary_ticket(), api.clone(), config);

    routine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    routine.stop().await;
    routine.wait().await;

    // t = 0, 250, 500, 750, 1000
    assert_eq!(api.submit_calls().await.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_slow_submit_finishes_before_stop_takes_effect() {
    let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
    api.set_submit_delay(Duration::from_secs(2)).await;
    let routine = routine(fixtures::ordinary_ticket(), &api);

    routine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    routine.stop().await;
    let state = routine.wait().await.unwrap();

    assert_eq!(state, RoutineState::Cancelled);
    assert_eq!(api.submit_calls().await.len(), 1);
    let status = routine.status().await;
    assert_eq!(status.attempts, 1);
    assert_eq!(status.last_code, Some(100001));
}
