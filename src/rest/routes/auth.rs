// rest/routes/auth.rs — login + refresh-token (no bearer required).

use crate::auth;
use crate::error::AppError;
use crate::rest::envelope::ApiResponse;
use crate::AppContext;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<LoginRequest>,
) -> Result<ApiResponse<auth::TokenPair>, AppError> {
    if body.identifier.is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "identifier and password are required".into(),
        ));
    }
    let pair = auth::login(&ctx.storage, &ctx.jwt, &body.identifier, &body.password).await?;
    Ok(ApiResponse::ok("login success", pair))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<RefreshRequest>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let access_token = auth::refresh(&ctx.jwt, &body.refresh_token)?;
    Ok(ApiResponse::ok(
        "refresh token success",
        json!({ "access_token": access_token }),
    ))
}
