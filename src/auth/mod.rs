// SPDX-License-Identifier: MIT
//! Bearer-token auth: HS256 access/refresh tokens plus the login check.
//!
//! Every protected HTTP route extracts the caller from `Authorization:
//! Bearer <token>`; the WebSocket handshake carries the same token as a
//! `token` query parameter.

use crate::error::AppError;
use crate::model::Role;
use crate::storage::Storage;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

const ISSUER: &str = "thesisd";
const ACCESS_TTL_SECS: i64 = 60 * 60; // 1 hour
const REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60; // 7 days

/// Which of the two token flavors a claim set belongs to. A refresh token is
/// only accepted by the refresh endpoint; an access token everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: Role,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signer/verifier built once from the configured secret.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    fn issue(&self, user_id: Uuid, role: Role, kind: TokenKind, ttl: i64) -> Result<String, AppError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            user_id,
            role,
            kind,
            iss: ISSUER.to_string(),
            iat: now,
            exp: now + ttl,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            warn!(err = %e, "failed to sign token");
            AppError::TokenInvalid
        })
    }

    pub fn issue_access(&self, user_id: Uuid, role: Role) -> Result<String, AppError> {
        self.issue(user_id, role, TokenKind::Access, ACCESS_TTL_SECS)
    }

    pub fn issue_refresh(&self, user_id: Uuid, role: Role) -> Result<String, AppError> {
        self.issue(user_id, role, TokenKind::Refresh, REFRESH_TTL_SECS)
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AppError::TokenInvalid)?;
        if data.claims.kind != kind {
            return Err(AppError::TokenInvalid);
        }
        Ok(data.claims)
    }

    /// Validate an access token and return its claims.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, TokenKind::Access)
    }

    /// Validate a refresh token and return its claims.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, TokenKind::Refresh)
    }
}

// ─── Login / refresh ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Check `identifier` + `password` against the directory and mint a token
/// pair. Unknown identifiers surface as `not_found`, bad passwords as
/// `incorrect_password`.
pub async fn login(
    storage: &Storage,
    keys: &JwtKeys,
    identifier: &str,
    password: &str,
) -> Result<TokenPair, AppError> {
    let creds = storage
        .credentials_by_identifier(identifier)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let ok = bcrypt::verify(password, &creds.password_hash).unwrap_or(false);
    if !ok {
        return Err(AppError::IncorrectPassword);
    }

    Ok(TokenPair {
        access_token: keys.issue_access(creds.user_id, creds.role)?,
        refresh_token: keys.issue_refresh(creds.user_id, creds.role)?,
    })
}

/// Exchange a refresh token for a fresh access token.
pub fn refresh(keys: &JwtKeys, refresh_token: &str) -> Result<String, AppError> {
    let claims = keys.verify_refresh(refresh_token)?;
    keys.issue_access(claims.user_id, claims.role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips() {
        let keys = JwtKeys::new("test-secret");
        let user_id = Uuid::new_v4();
        let token = keys.issue_access(user_id, Role::Student).unwrap();
        let claims = keys.verify_access(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn refresh_token_is_rejected_as_access() {
        let keys = JwtKeys::new("test-secret");
        let token = keys.issue_refresh(Uuid::new_v4(), Role::Lecturer).unwrap();
        assert!(keys.verify_access(&token).is_err());
        assert!(keys.verify_refresh(&token).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let keys = JwtKeys::new("secret-a");
        let other = JwtKeys::new("secret-b");
        let token = keys.issue_access(Uuid::new_v4(), Role::Student).unwrap();
        assert!(other.verify_access(&token).is_err());
    }

    #[test]
    fn refresh_mints_a_new_access_token() {
        let keys = JwtKeys::new("test-secret");
        let user_id = Uuid::new_v4();
        let refresh_token = keys.issue_refresh(user_id, Role::Student).unwrap();
        let access = refresh(&keys, &refresh_token).unwrap();
        let claims = keys.verify_access(&access).unwrap();
        assert_eq!(claims.user_id, user_id);
    }
}
