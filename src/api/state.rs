//! Application state for the API server

use crate::{Config, pipeline::BatchCoordinator};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the coordinator instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main BatchCoordinator instance
    pub coordinator: Arc<BatchCoordinator>,

    /// Configuration (for read access)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(coordinator: Arc<BatchCoordinator>, config: Arc<Config>) -> Self {
        Self {
            coordinator,
            config,
        }
    }
}
