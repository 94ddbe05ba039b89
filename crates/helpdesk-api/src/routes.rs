//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::error::{HelpdeskError, Result};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers;
use crate::state::AppState;

/// Largest accepted request body.
const BODY_LIMIT: usize = 64 * 1024;

/// Origins allowed by CORS: the server's own address plus configured extras.
fn allowed_origins(config: &HelpdeskConfig) -> Vec<HeaderValue> {
    let port = config.server.port;
    let mut origins = vec![
        format!("http://{}:{}", config.server.host, port),
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ];
    origins.extend(config.server.allowed_origins.iter().cloned());
    origins.dedup();

    origins
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state.config)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/sessions/{id}", delete(handlers::delete_session))
        .route("/sessions/{id}/history", get(handlers::session_history))
        .route("/sessions/{id}/state", get(handlers::session_state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn start_server(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HelpdeskError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    info!(addr = %addr, "Starting API server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HelpdeskError::Api(format!("Server error: {}", e)))?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins_defaults() {
        let config = HelpdeskConfig::default();
        let origins = allowed_origins(&config);
        assert!(origins.contains(&HeaderValue::from_static("http://127.0.0.1:3030")));
        assert!(origins.contains(&HeaderValue::from_static("http://localhost:3030")));
    }

    #[test]
    fn test_allowed_origins_extra_and_invalid() {
        let mut config = HelpdeskConfig::default();
        config.server.allowed_origins = vec![
            "https://support.example.com".to_string(),
            "bad\norigin".to_string(),
        ];
        let origins = allowed_origins(&config);
        assert!(origins.contains(&HeaderValue::from_static("https://support.example.com")));
        assert!(origins
            .iter()
            .all(|o| o.to_str().map_or(true, |s| !s.contains('\n'))));
    }
}
