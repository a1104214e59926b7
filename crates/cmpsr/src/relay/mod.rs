//! Command orchestration: per-connection sessions over shared collaborators.

mod session;

pub use session::Session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::action::{ActionExecutor, ActionRunner};
use crate::config::{AppConfig, RelayConfig};
use crate::probe::TargetProbe;
use crate::tail::LogWatcher;

/// Process-wide collaborators shared by every session.
///
/// The gate is the single serialization point against the one external
/// target: only the session holding its permit may be mid-delivery.
pub struct RelayState {
    pub probe: Arc<dyn TargetProbe>,
    pub runner: ActionRunner,
    pub gate: Arc<Semaphore>,
    pub watcher: LogWatcher,
    pub log_dir: Option<PathBuf>,
    pub timing: RelayConfig,
    pub quiet_period: Duration,
}

impl RelayState {
    pub fn new(
        cfg: &AppConfig,
        probe: Arc<dyn TargetProbe>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let log_dir = cfg.watch.log_dir.as_deref().map(expand_dir);
        Self {
            probe,
            runner: ActionRunner::new(executor, &cfg.target, &cfg.relay),
            gate: Arc::new(Semaphore::new(1)),
            watcher: LogWatcher::new(cfg.watch.suffix.clone()),
            log_dir,
            timing: cfg.relay.clone(),
            quiet_period: cfg.watch.quiet_period(),
        }
    }
}

fn expand_dir(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}
