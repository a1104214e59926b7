//! Test utilities and common setup.
#![allow(clippy::field_reassign_with_default)]
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use tokio::sync::Notify;

use cmpsr::action::ActionExecutor;
use cmpsr::api::{self, AppState};
use cmpsr::config::AppConfig;
use cmpsr::probe::TargetProbe;
use cmpsr::relay::RelayState;
use cmpsr_protocol::StatusPayload;

/// Probe that always reports the same snapshot.
pub struct FixedProbe(pub StatusPayload);

#[async_trait]
impl TargetProbe for FixedProbe {
    async fn probe(&self) -> StatusPayload {
        self.0
    }
}

/// Executor that records every script it is asked to run. Optionally parks
/// each call on a barrier until the test releases it.
pub struct RecordingExecutor {
    pub scripts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    pub result: bool,
    pub barrier: Option<Arc<Notify>>,
}

impl RecordingExecutor {
    pub fn instant(result: bool) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            result,
            barrier: None,
        })
    }

    pub fn parked(barrier: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            result: true,
            barrier: Some(barrier),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, at_least: usize) {
        while self.call_count() < at_least {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn run(&self, script: &str) -> bool {
        self.scripts.lock().unwrap().push(script.to_string());
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.notified().await;
        }
        self.result
    }
}

pub fn online() -> StatusPayload {
    StatusPayload {
        cursor: true,
        composer: true,
    }
}

/// Config with timings shortened so cycles conclude within test budgets.
pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.relay.status_interval_secs = 1;
    cfg.relay.completion_timeout_secs = 1;
    cfg.relay.activation_retry_delay_ms = 50;
    cfg.watch.quiet_period_ms = 200;
    cfg
}

pub fn test_app(status: StatusPayload, executor: Arc<dyn ActionExecutor>) -> Router {
    test_app_with_config(test_config(), status, executor)
}

pub fn test_app_with_config(
    cfg: AppConfig,
    status: StatusPayload,
    executor: Arc<dyn ActionExecutor>,
) -> Router {
    let relay = Arc::new(RelayState::new(&cfg, Arc::new(FixedProbe(status)), executor));
    api::create_router(AppState::new(&cfg, relay))
}

/// Serve the router on an ephemeral port for real-socket tests.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    addr
}
