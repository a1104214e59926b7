//! Application configuration.
//!
//! Every section has serde defaults so a partial (or absent) config file
//! yields a fully usable configuration. Timing values are config-level
//! constants: they shape every command cycle uniformly and are not
//! adjustable per call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub target: TargetConfig,
    pub relay: RelayConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level when no verbosity flag is given.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Browser origins allowed to open WebSocket connections.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
                "http://localhost:5175".to_string(),
                "http://localhost:5176".to_string(),
            ],
        }
    }
}

/// The desktop application commands are relayed into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Application name as the OS scripting layer knows it.
    pub app_name: String,
    /// Regex matched against the process table to decide liveness.
    pub process_pattern: String,
    /// Key pressed with the command modifier to open the composer pane.
    pub composer_shortcut: String,
    /// Path to the OS scripting bridge binary.
    pub osascript_binary: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            app_name: "Cursor".to_string(),
            process_pattern: "Cursor".to_string(),
            composer_shortcut: "i".to_string(),
            osascript_binary: "osascript".to_string(),
        }
    }
}

/// Timing knobs for the command cycle and status polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Seconds between status broadcasts to a connected client.
    pub status_interval_secs: u64,
    /// Upper bound for each individual probe check.
    pub probe_timeout_ms: u64,
    /// Activation attempts before the cycle is abandoned.
    pub activation_attempts: u32,
    /// Delay between activation attempts.
    pub activation_retry_delay_ms: u64,
    /// Fallback completion timeout when no log watch is available.
    pub completion_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: 5,
            probe_timeout_ms: 800,
            activation_attempts: 3,
            activation_retry_delay_ms: 500,
            completion_timeout_secs: 30,
        }
    }
}

impl RelayConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn activation_retry_delay(&self) -> Duration {
        Duration::from_millis(self.activation_retry_delay_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }
}

/// Log-tail configuration for completion detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory the target application appends response logs to.
    /// Supports `~` and environment variables. When unset, cycles complete
    /// via the fixed timeout instead of log tailing.
    pub log_dir: Option<String>,
    /// File suffix recognized as a response log.
    pub suffix: String,
    /// Quiet period after the last tailed line before the cycle is
    /// considered complete.
    pub quiet_period_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            suffix: ".log".to_string(),
            quiet_period_ms: 2000,
        }
    }
}

impl WatchConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}
