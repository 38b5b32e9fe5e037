use std::sync::Arc;

use crate::worker::WorkerDeps;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<WorkerDeps>,
}

impl AppState {
    pub fn new(deps: WorkerDeps) -> Self {
        Self {
            deps: Arc::new(deps),
        }
    }
}
