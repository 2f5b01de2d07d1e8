//! Shared application state.
//!
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the room registry (the only structure mutated from multiple
//! connections' handlers) and the execution-service client.

use std::sync::Arc;

use crate::registry::RoomRegistry;
use crate::services::execute::ExecutionClient;

/// Shared application state. Clone is required by Axum — all inner fields
/// are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub executor: ExecutionClient,
}

impl AppState {
    #[must_use]
    pub fn new(executor: ExecutionClient) -> Self {
        Self { registry: Arc::new(RoomRegistry::new()), executor }
    }
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// Create a test `AppState` with no executor endpoint configured.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(ExecutionClient::new(None))
    }
}
