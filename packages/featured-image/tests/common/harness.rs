//! Test harness wiring the router to mock-backed dependencies.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use featured_image::kernel::{DiagnosticLog, NonceService, TestDependencies};
use featured_image::server::{build_app, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use super::fixtures::{ADMIN_TOKEN, ALICE_TOKEN, BOB_TOKEN};

/// Upper bound on response bodies read in tests
const BODY_LIMIT: usize = 1024 * 1024;

pub struct TestHarness {
    pub deps: TestDependencies,
    pub state: AppState,
    // Keeps the diagnostic log directory alive
    _data_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_deps(TestDependencies::new())
    }

    pub fn with_deps(deps: TestDependencies) -> Self {
        Self::build(deps, None)
    }

    pub fn with_webhook_secret(secret: &str) -> Self {
        Self::build(TestDependencies::new(), Some(secret.to_string()))
    }

    fn build(deps: TestDependencies, webhook_secret: Option<String>) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let data_dir = TempDir::new().expect("Failed to create temp dir");
        let diagnostic_log = Arc::new(DiagnosticLog::new(
            data_dir.path().join("featured-image-debug.log"),
            deps.settings.clone(),
        ));
        let operator_tokens = HashMap::from([
            (ADMIN_TOKEN.to_string(), "admin".to_string()),
            (ALICE_TOKEN.to_string(), "alice".to_string()),
            (BOB_TOKEN.to_string(), "bob".to_string()),
        ]);

        let state = AppState {
            deps: deps.deps(),
            nonces: Arc::new(NonceService::new("test-secret")),
            diagnostic_log,
            operator_tokens: Arc::new(operator_tokens),
            admin_operators: Arc::new(vec!["admin".to_string()]),
            webhook_secret,
        };

        Self {
            deps,
            state,
            _data_dir: data_dir,
        }
    }

    pub fn app(&self) -> Router {
        build_app(self.state.clone())
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        self.send(Method::POST, uri, token, body).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .app()
            .oneshot(request)
            .await
            .expect("Router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
            .await
            .expect("Failed to read body");

        TestResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("Response is not JSON ({}): {}", e, self.body))
    }
}
