//! Helpdesk API crate - axum HTTP server and route handlers.
//!
//! Exposes the dialog controller's turn entry point and session inspection
//! as a JSON API, plus a health check.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
