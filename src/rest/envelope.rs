//! The uniform response envelope:
//! `{status, message, data?, meta?, error?}`.

use crate::error::AppError;
use crate::pagination::{max_page, PageRequest};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Meta {
    pub page: u64,
    pub per_page: u64,
    pub max_page: u64,
    pub count: u64,
}

impl Meta {
    pub fn from_page(page: PageRequest, count: u64) -> Self {
        let norm = page.normalize();
        Self {
            page: norm.page,
            per_page: norm.per_page,
            max_page: max_page(count, norm.per_page),
            count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: &str, data: T) -> Self {
        Self {
            status: true,
            message: message.to_string(),
            data: Some(data),
            meta: None,
            error: None,
        }
    }

    pub fn ok_paged(message: &str, data: T, meta: Meta) -> Self {
        Self {
            status: true,
            message: message.to_string(),
            data: Some(data),
            meta: Some(meta),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failed(message: &str, error: &str) -> Self {
        Self {
            status: false,
            message: message.to_string(),
            data: None,
            meta: None,
            error: Some(error.to_string()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let envelope = ApiResponse::failed(&self.to_string(), self.code());
        (self.status(), Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_error() {
        let resp = ApiResponse::ok("done", serde_json::json!({"id": 1}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], true);
        assert_eq!(json["message"], "done");
        assert!(json.get("error").is_none());
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn failure_envelope_carries_the_code() {
        let resp = ApiResponse::failed("session is finished", "finished");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["error"], "finished");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn meta_math_matches_pagination_contract() {
        let meta = Meta::from_page(PageRequest { page: 0, per_page: 0 }, 21);
        assert_eq!(meta.page, 1);
        assert_eq!(meta.per_page, 10);
        assert_eq!(meta.max_page, 3);
        assert_eq!(meta.count, 21);
    }
}
