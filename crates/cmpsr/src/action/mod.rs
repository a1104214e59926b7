//! Opaque scripted actions against the target application.
//!
//! The relay core only depends on the boolean contract of [`ActionExecutor`]:
//! run one script, report success or failure. The concrete executor shells
//! out to the OS scripting bridge; tests substitute their own. On top of the
//! executor, [`ActionRunner`] owns the two scripted actions of a command
//! cycle — activation (bring the target frontmost, open the composer) and
//! delivery (keystroke the text, press Return) — plus the activation retry
//! policy.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{RelayConfig, TargetConfig};
use crate::error::RelayError;

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute one opaque script; `true` iff the external call reports
    /// success. Must not panic or error — any failure is `false`.
    async fn run(&self, script: &str) -> bool;
}

/// Executor that invokes the OS scripting bridge (`osascript -e`).
pub struct OsaExecutor {
    binary: String,
}

impl OsaExecutor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ActionExecutor for OsaExecutor {
    async fn run(&self, script: &str) -> bool {
        let status = Command::new(&self.binary)
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(err) => {
                warn!("failed to spawn scripting bridge: {err}");
                false
            }
        }
    }
}

/// Escape text for embedding inside a double-quoted script string literal.
///
/// Backslash first, then quote — otherwise the escape characters introduced
/// for quotes would be escaped again.
pub fn escape_keystroke_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Drives the activation and delivery actions for one target application.
pub struct ActionRunner {
    executor: Arc<dyn ActionExecutor>,
    activation_script: String,
    activation_attempts: u32,
    retry_delay: Duration,
}

impl ActionRunner {
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        target: &TargetConfig,
        relay: &RelayConfig,
    ) -> Self {
        Self {
            executor,
            activation_script: activation_script(&target.app_name, &target.composer_shortcut),
            activation_attempts: relay.activation_attempts.max(1),
            retry_delay: relay.activation_retry_delay(),
        }
    }

    /// Bring the target frontmost and open the composer, retrying up to the
    /// configured attempt budget with a fixed delay between attempts.
    pub async fn activate(&self) -> Result<(), RelayError> {
        for attempt in 1..=self.activation_attempts {
            if self.executor.run(&self.activation_script).await {
                return Ok(());
            }
            debug!(
                "activation attempt {attempt}/{} failed",
                self.activation_attempts
            );
            if attempt < self.activation_attempts {
                sleep(self.retry_delay).await;
            }
        }
        Err(RelayError::ActivationFailed)
    }

    /// Type the command text into the composer and submit it. Single
    /// attempt: a failed delivery may already have leaked keystrokes, so
    /// retrying is not safe.
    pub async fn deliver(&self, text: &str) -> Result<(), RelayError> {
        let script = delivery_script(text);
        if self.executor.run(&script).await {
            Ok(())
        } else {
            Err(RelayError::DeliveryFailed)
        }
    }
}

fn activation_script(app_name: &str, composer_shortcut: &str) -> String {
    format!(
        r#"tell application "{app_name}"
  activate
end tell

repeat until application "{app_name}" is frontmost
  delay 0.1
end repeat

tell application "System Events"
  keystroke "{composer_shortcut}" using command down
  delay 0.2
end tell"#
    )
}

fn delivery_script(text: &str) -> String {
    let escaped = escape_keystroke_text(text);
    format!(
        r#"tell application "System Events"
  keystroke "{escaped}"
  delay 0.1
  key code 36
end tell"#
    )
}
