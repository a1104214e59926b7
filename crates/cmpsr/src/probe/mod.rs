//! Liveness and capability probing for the target application.
//!
//! Two independent checks: is the target process present in the process
//! table, and does it currently expose an automatable composer surface.
//! Both checks are bounded by a timeout and collapse any failure to
//! `false` — a probe never errors and has no side effects, so it is safe
//! to run concurrently from every connected session.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use cmpsr_protocol::StatusPayload;

use crate::config::TargetConfig;

#[async_trait]
pub trait TargetProbe: Send + Sync {
    async fn probe(&self) -> StatusPayload;
}

/// Probe backed by the host OS: process table scan plus a UI-hierarchy
/// query through the scripting bridge.
pub struct OsProbe {
    process_pattern: Regex,
    surface_script: String,
    osascript_binary: String,
    check_timeout: Duration,
}

impl OsProbe {
    pub fn new(target: &TargetConfig, check_timeout: Duration) -> Result<Self, regex::Error> {
        let process_pattern = Regex::new(&target.process_pattern)?;
        Ok(Self {
            process_pattern,
            surface_script: surface_script(&target.app_name),
            osascript_binary: target.osascript_binary.clone(),
            check_timeout,
        })
    }

    async fn process_running(&self) -> bool {
        let scan = async {
            let output = Command::new("ps")
                .args(["-axo", "comm="])
                .stdin(Stdio::null())
                .output()
                .await
                .ok()?;
            if !output.status.success() {
                return None;
            }
            let table = String::from_utf8_lossy(&output.stdout);
            Some(table_has_process(&table, &self.process_pattern))
        };

        match timeout(self.check_timeout, scan).await {
            Ok(Some(running)) => running,
            Ok(None) | Err(_) => {
                debug!("process table scan failed or timed out");
                false
            }
        }
    }

    async fn surface_available(&self) -> bool {
        let query = async {
            let output = Command::new(&self.osascript_binary)
                .arg("-e")
                .arg(&self.surface_script)
                .stdin(Stdio::null())
                .output()
                .await
                .ok()?;
            if !output.status.success() {
                return None;
            }
            Some(String::from_utf8_lossy(&output.stdout).trim() == "true")
        };

        match timeout(self.check_timeout, query).await {
            Ok(Some(available)) => available,
            Ok(None) | Err(_) => {
                debug!("composer surface query failed or timed out");
                false
            }
        }
    }
}

#[async_trait]
impl TargetProbe for OsProbe {
    async fn probe(&self) -> StatusPayload {
        let (cursor, composer) =
            tokio::join!(self.process_running(), self.surface_available());
        StatusPayload { cursor, composer }
    }
}

/// True when any process-table line matches the liveness pattern.
fn table_has_process(table: &str, pattern: &Regex) -> bool {
    table.lines().any(|line| pattern.is_match(line))
}

/// UI-hierarchy query: the composer is automatable once the target process
/// exposes a menu bar.
fn surface_script(app_name: &str) -> String {
    format!(
        "tell application \"System Events\"\n  tell process \"{app_name}\"\n    exists menu bar 1\n  end tell\nend tell"
    )
}
