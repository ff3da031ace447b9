//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a real supervisor, scheduler and SQLite intent store, with the
//! ticketing API, notifier and clock authority replaced by mocks.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use presale_core::{
    config::{DatabaseConfig, SupervisorConfig},
    testing::{MockClockSource, MockNotifier, MockShowApi},
    ClockSync, Config, RoutineConfig, RoutineSupervisor, Scheduler,
    SqliteTicketStore, TicketStore,
};
use presale_server::api::create_router;
use presale_server::state::AppState;

/// Re-export fixtures for test convenience
pub use presale_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_register_intent() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/tickets", ticket_body(3600)).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub supervisor: Arc<RoutineSupervisor>,
    /// Mock ticketing API - script submissions
    pub api: Arc<MockShowApi>,
    pub notifier: Arc<MockNotifier>,
    /// Mock time authority, present when clock sync is enabled
    pub clock: Option<Arc<MockClockSource>>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Arm a scheduler task for every intent
    pub auto_schedule: bool,
    /// Wire a clock sync against a mock authority
    pub enable_clock: bool,
}

impl TestConfig {
    pub fn with_auto_schedule() -> Self {
        Self {
            auto_schedule: true,
            enable_clock: false,
        }
    }

    pub fn with_clock() -> Self {
        Self {
            auto_schedule: true,
            enable_clock: true,
        }
    }
}

impl TestFixture {
    /// Create a fixture where routines only run on force-start.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let api = Arc::new(MockShowApi::with_project(fixtures::plain_project()));
        let notifier = Arc::new(MockNotifier::new());

        let mut config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            routine: RoutineConfig {
                retry_interval_ms: 10,
                ..RoutineConfig::default()
            },
            supervisor: SupervisorConfig {
                auto_schedule: test_config.auto_schedule,
            },
            ..Config::default()
        };
        config.clock.enabled = test_config.enable_clock;

        let store: Arc<dyn TicketStore> = Arc::new(
            SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"),
        );
        let scheduler = Arc::new(Scheduler::new());

        // Not started: tests drive syncs through the API
        let (clock, clock_sync) = if test_config.enable_clock {
            let source = Arc::new(MockClockSource::new("mock"));
            let sync = Arc::new(ClockSync::new(
                Arc::clone(&source) as _,
                Arc::clone(&scheduler),
                Duration::from_secs(60),
            ));
            (Some(source), Some(sync))
        } else {
            (None, None)
        };

        let supervisor = Arc::new(RoutineSupervisor::new(
            config.supervisor.clone(),
            config.routine.clone(),
            scheduler,
            store,
            Arc::clone(&api) as _,
            Arc::clone(&notifier) as _,
        ));
        supervisor
            .start()
            .await
            .expect("Failed to start supervisor");

        let state = Arc::new(AppState::new(config, Arc::clone(&supervisor), clock_sync));
        let router = create_router(state);

        Self {
            router,
            supervisor,
            api,
            notifier,
            clock,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).to_string())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Poll until the routine has been retired by the supervisor.
    pub async fn wait_for_retired(&self, hash: &str) -> bool {
        let path = format!("/api/v1/routines/{}", hash);
        for _ in 0..200 {
            if self.get(&path).await.status == StatusCode::NOT_FOUND {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    /// Poll until the routine has stopped in the given state.
    pub async fn wait_for_stopped(&self, hash: &str, state: &str) -> bool {
        let path = format!("/api/v1/routines/{}", hash);
        for _ in 0..200 {
            let response = self.get(&path).await;
            if response.status == StatusCode::OK
                && response.body["running"] == false
                && response.body["state"]["type"] == state
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

/// JSON body for an intent on the fixture project whose sale starts
/// `start_in_secs` from now (negative for an open sale).
pub fn ticket_body(start_in_secs: i64) -> Value {
    let now = chrono::Utc::now();
    json!({
        "project_id": fixtures::PROJECT_ID,
        "sku_id": fixtures::SKU_ID,
        "screen_id": fixtures::SCREEN_ID,
        "sale_start": now + chrono::Duration::seconds(start_in_secs),
        "sale_expire": now + chrono::Duration::days(1),
        "buyer": { "type": "ordinary", "name": "A", "tel": "123" },
        "project_name": "Test Show",
        "sku_name": "Standard",
        "screen_name": "Day 1",
    })
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
