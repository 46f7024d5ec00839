//! # RLPA Management API
//!
//! HTTP front end for shell-mode sessions. A device that enters shell mode
//! shows a ManageID and password; management tools use them here to lock
//! the session and run lpac commands against the device's card.
//!
//! ## Routes
//!
//! ```text
//! GET  /                 banner
//! GET  /manifest         manifest
//! GET  /info/:id         credential check
//! POST /connect/:id      take the API lock, start keepalive
//! POST /keepalive/:id    reset the keepalive timer
//! POST /disconnect/:id   reserved
//! POST /shell/:id        {"type":0,"command":"..."} run, {"type":1} finish
//! ```
//!
//! Every `:id` route requires the matching `Password` header.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod error;
pub mod handlers;

use std::io;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use rlpa_gateway::ManagementApi;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use handlers::{AppState, ShellRequest, PASSWORD_HEADER};

/// Build the management router over `api`.
pub fn build_router(api: Arc<dyn ManagementApi>) -> Router {
    let state = AppState { api };

    Router::new()
        .route("/", get(handlers::home))
        .route("/manifest", get(handlers::manifest))
        .route("/info/:id", get(handlers::info))
        .route("/connect/:id", post(handlers::connect))
        .route("/keepalive/:id", post(handlers::keepalive))
        .route("/disconnect/:id", post(handlers::disconnect))
        .route("/shell/:id", post(handlers::shell))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve the management API until `shutdown` flips or its sender goes away.
pub async fn serve(
    listener: TcpListener,
    api: Arc<dyn ManagementApi>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "Management API listening");
    axum::serve(listener, build_router(api))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("Management API stopping");
        })
        .await
}
