//! Bearer-token extraction for protected routes.

use crate::auth::Claims;
use crate::error::AppError;
use crate::AppContext;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

/// The authenticated caller, extracted from `Authorization: Bearer <jwt>`.
pub struct AuthedUser(pub Claims);

impl FromRequestParts<Arc<AppContext>> for AuthedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenInvalid)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AppError::TokenInvalid)?;
        let claims = state.jwt.verify_access(token)?;
        Ok(AuthedUser(claims))
    }
}
