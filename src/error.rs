// SPDX-License-Identifier: MIT
//! Typed error taxonomy for the core services.
//!
//! Every service returns `Result<_, AppError>`; the HTTP boundary maps the
//! variant to a status code and a short machine-readable code carried in the
//! response envelope. Fan-out never surfaces errors through this type — a
//! failed delivery degrades to a notification instead.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    // ── 400 bad request ──────────────────────────────────────────────────
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("a live session already exists for this thesis")]
    AlreadyStarted,
    #[error("the session owner cannot also join")]
    SameUser,
    #[error("the session owner cannot leave")]
    OwnerCannotLeave,
    #[error("session has not started yet")]
    NotStarted,
    #[error("session is finished")]
    Finished,
    #[error("session is already finished")]
    AlreadyFinished,
    #[error("only the session owner may end it")]
    NotOwner,
    #[error("messages are not readable in this session status")]
    InvalidStatus,

    // ── 401 unauthorized ─────────────────────────────────────────────────
    #[error("unauthorized")]
    Unauthorized,
    #[error("missing or invalid token")]
    TokenInvalid,

    // ── 404 not found ────────────────────────────────────────────────────
    #[error("{0} not found")]
    NotFound(&'static str),

    // ── 500 internal ─────────────────────────────────────────────────────
    #[error("directory read failed")]
    ResolveFailed(#[source] sqlx::Error),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("live buffer error")]
    Buffer(#[from] redis::RedisError),
    #[error("broker publish failed: {0}")]
    Broker(String),
    #[error("encoding error")]
    Encoding(#[from] serde_json::Error),
}

impl AppError {
    /// Short machine-readable code for the envelope's `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "bad_request",
            AppError::IncorrectPassword => "incorrect_password",
            AppError::AlreadyStarted => "already_started",
            AppError::SameUser => "same_user",
            AppError::OwnerCannotLeave => "owner_cannot_leave",
            AppError::NotStarted => "not_started",
            AppError::Finished => "finished",
            AppError::AlreadyFinished => "already_finished",
            AppError::NotOwner => "not_owner",
            AppError::InvalidStatus => "invalid_status",
            AppError::Unauthorized => "unauthorized",
            AppError::TokenInvalid => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::ResolveFailed(_) => "resolve_failed",
            AppError::Database(_) | AppError::Buffer(_) | AppError::Broker(_) | AppError::Encoding(_) => {
                "internal"
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::IncorrectPassword
            | AppError::AlreadyStarted
            | AppError::SameUser
            | AppError::OwnerCannotLeave
            | AppError::NotStarted
            | AppError::Finished
            | AppError::AlreadyFinished
            | AppError::NotOwner
            | AppError::InvalidStatus => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ResolveFailed(_)
            | AppError::Database(_)
            | AppError::Buffer(_)
            | AppError::Broker(_)
            | AppError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_their_status_classes() {
        assert_eq!(AppError::AlreadyStarted.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::SameUser.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("session").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Broker("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn token_failures_share_the_unauthorized_code() {
        assert_eq!(AppError::TokenInvalid.code(), "unauthorized");
        assert_eq!(AppError::Unauthorized.code(), "unauthorized");
    }
}
