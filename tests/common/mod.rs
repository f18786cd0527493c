#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use ops_gateway::{
    AppState, build_router,
    cache::Snapshot,
    clock::ManualClock,
    config::Config,
    upstream::{CrmSource, QueryParams, UpstreamError},
};
use serde_json::{Value, json};
use tokio::sync::Semaphore;

/// 可计数、可失败、可阻塞的假上游
pub struct FakeSource {
    pub snapshot_calls: AtomicUsize,
    pub collection_calls: AtomicUsize,
    fail: AtomicBool,
    gate: Option<Arc<Semaphore>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            snapshot_calls: AtomicUsize::new(0),
            collection_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            gate: None,
        })
    }

    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            snapshot_calls: AtomicUsize::new(0),
            collection_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            gate: Some(gate),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn collection_calls(&self) -> usize {
        self.collection_calls.load(Ordering::SeqCst)
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
    }

    fn check_failure(&self) -> Result<(), UpstreamError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(UpstreamError::Status {
                status: 503,
                resource: "customers".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl CrmSource for FakeSource {
    fn fetch_collection<'a>(
        &'a self,
        instance: &'a str,
        resource: &'a str,
        params: &'a QueryParams,
    ) -> BoxFuture<'a, Result<Vec<Value>, UpstreamError>> {
        async move {
            self.collection_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_gate().await;
            self.check_failure()?;
            Ok(vec![json!({
                "instance": instance,
                "resource": resource,
                "params": params,
            })])
        }
        .boxed()
    }

    fn fetch_snapshot<'a>(&'a self, instance: &'a str) -> BoxFuture<'a, Result<Snapshot, UpstreamError>> {
        async move {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_gate().await;
            self.check_failure()?;
            Ok(Snapshot {
                customers: vec![json!({"name": "Northwind HVAC", "instance": instance})],
                projects: vec![json!({"id": 11}), json!({"id": 12})],
                service_requests: vec![json!({"id": 21})],
                invoices: Vec::new(),
            })
        }
        .boxed()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: ManualClock,
}

pub fn test_config() -> Config {
    let mut config = Config::new("http://upstream.test", "test-key");
    config.rate_limit_sweep_probability = 0.0;
    config
}

pub fn spawn_app(config: Config, source: Arc<FakeSource>) -> TestApp {
    let clock = ManualClock::new();
    let state = AppState::with_clock(config, source, Arc::new(clock.clone()));
    TestApp {
        router: build_router(state.clone()),
        state,
        clock,
    }
}

pub fn get(uri: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .header("user-agent", "ops-dashboard/1.0")
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "10.0.0.1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
