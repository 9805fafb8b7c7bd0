// rest/mod.rs — the public HTTP API.
//
// Axum router under /api/v1. All endpoints except login/refresh, health and
// metrics require a bearer token; responses share one envelope shape.
//
// Endpoints:
//   POST /api/v1/auth/login
//   POST /api/v1/auth/refresh-token
//   POST /api/v1/sessions/start/{thesis_id}
//   POST /api/v1/sessions/{session_id}/join
//   POST /api/v1/sessions/{session_id}/leave
//   POST /api/v1/sessions/{session_id}/end
//   GET  /api/v1/sessions
//   GET  /api/v1/sessions/{session_id}
//   POST /api/v1/sessions/{session_id}/messages
//   GET  /api/v1/sessions/{session_id}/messages
//   GET  /api/v1/notifications
//   GET  /api/v1/notifications/{id}
//   GET  /api/v1/health
//   GET  /api/v1/metrics

pub mod auth;
pub mod envelope;
pub mod routes;

use crate::AppContext;
use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // No auth
        .route("/api/v1/health", get(routes::misc::health))
        .route("/api/v1/metrics", get(routes::misc::metrics))
        .route("/api/v1/auth/login", post(routes::auth::login))
        .route(
            "/api/v1/auth/refresh-token",
            post(routes::auth::refresh_token),
        )
        // Sessions
        .route("/api/v1/sessions", get(routes::sessions::list))
        .route(
            "/api/v1/sessions/start/{thesis_id}",
            post(routes::sessions::start),
        )
        .route(
            "/api/v1/sessions/{session_id}",
            get(routes::sessions::detail),
        )
        .route(
            "/api/v1/sessions/{session_id}/join",
            post(routes::sessions::join),
        )
        .route(
            "/api/v1/sessions/{session_id}/leave",
            post(routes::sessions::leave),
        )
        .route(
            "/api/v1/sessions/{session_id}/end",
            post(routes::sessions::end),
        )
        // Messages
        .route(
            "/api/v1/sessions/{session_id}/messages",
            post(routes::messages::send).get(routes::messages::list),
        )
        // Notifications
        .route("/api/v1/notifications", get(routes::notifications::list))
        .route(
            "/api/v1/notifications/{id}",
            get(routes::notifications::detail),
        )
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

pub async fn start_http_server(ctx: Arc<AppContext>) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", ctx.config.port).parse()?;
    let router = build_router(ctx);

    info!("HTTP API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
