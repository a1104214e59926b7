//! Application state shared across handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::relay::RelayState;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayState>,
    pub connections: Arc<ConnectionRegistry>,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(cfg: &AppConfig, relay: Arc<RelayState>) -> Self {
        Self {
            relay,
            connections: Arc::new(ConnectionRegistry::default()),
            cors_origins: cfg.server.cors_origins.clone(),
        }
    }
}

/// Registry of live WebSocket connections, for logs and health reporting.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, ConnectionInfo>,
}

pub struct ConnectionInfo {
    pub connected_at: DateTime<Utc>,
}

impl ConnectionRegistry {
    pub fn register(&self, id: Uuid) {
        self.connections.insert(
            id,
            ConnectionInfo {
                connected_at: Utc::now(),
            },
        );
    }

    pub fn unregister(&self, id: Uuid) {
        if let Some((_, info)) = self.connections.remove(&id) {
            let connected_for = Utc::now() - info.connected_at;
            debug!("connection {id} closed after {connected_for}");
        }
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}
