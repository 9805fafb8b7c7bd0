// rest/routes/misc.rs — health + metrics (no auth).

use crate::AppContext;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": ctx.metrics.started_at.elapsed().as_secs(),
        "online_users": ctx.router.registry.online_users().await,
    }))
}

pub async fn metrics(State(ctx): State<Arc<AppContext>>) -> String {
    let online = ctx.router.registry.online_users().await;
    ctx.metrics.render_prometheus(online)
}
