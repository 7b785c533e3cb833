//! REST API for driving back-office wizards.
//!
//! Exposes wizard definitions, per-key wizard sessions (navigation, field
//! updates, confirm and submit) and the stored drafts. Swagger UI is served
//! at `/swagger-ui` with the generated document at `/api-docs/openapi.json`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::ApiState;

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/status", get(routes::health::status))
        // Wizard definitions
        .route("/api/v1/wizards", get(routes::wizards::list))
        .route("/api/v1/wizards/:kind", get(routes::wizards::get_one))
        .route(
            "/api/v1/wizards/:kind/sessions",
            post(routes::sessions::open),
        )
        // Session endpoints
        .route(
            "/api/v1/sessions/:key",
            get(routes::sessions::get_one).delete(routes::sessions::close),
        )
        .route(
            "/api/v1/sessions/:key/data",
            patch(routes::sessions::patch_data),
        )
        .route("/api/v1/sessions/:key/next", post(routes::sessions::next))
        .route(
            "/api/v1/sessions/:key/previous",
            post(routes::sessions::previous),
        )
        .route(
            "/api/v1/sessions/:key/goto/:step",
            post(routes::sessions::go_to),
        )
        .route(
            "/api/v1/sessions/:key/confirm",
            post(routes::sessions::confirm),
        )
        .route(
            "/api/v1/sessions/:key/submit",
            post(routes::sessions::submit),
        )
        // Draft endpoints
        .route("/api/v1/drafts", get(routes::drafts::list))
        .route("/api/v1/drafts/:key", get(routes::drafts::get_one))
        .route("/api/v1/drafts/:key", delete(routes::drafts::delete))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server and run until ctrl-c
///
/// Open sessions are flushed to the draft store before returning.
pub async fn serve(state: ApiState, addr: SocketAddr) -> Result<()> {
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("REST API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    state.close_all().await;
    tracing::info!("REST API server stopped");
    Ok(())
}

/// Resolve the listen address from the configured host and port
pub fn listen_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))
}
