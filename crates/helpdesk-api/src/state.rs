//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use helpdesk_chat::DialogController;
use helpdesk_core::config::HelpdeskConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The
/// controller guards its own per-session state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HelpdeskConfig>,
    pub controller: Arc<DialogController>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: HelpdeskConfig, controller: Arc<DialogController>) -> Self {
        Self {
            config: Arc::new(config),
            controller,
            start_time: Instant::now(),
        }
    }
}
