// rest/routes/sessions.rs — session lifecycle + listing routes.

use crate::error::AppError;
use crate::model::SessionStatus;
use crate::pagination::PageRequest;
use crate::rest::auth::AuthedUser;
use crate::rest::envelope::{ApiResponse, Meta};
use crate::session::{self, SessionDetail};
use crate::storage::{SessionFilter, SortOrder};
use crate::AppContext;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub async fn start(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Path(thesis_id): Path<Uuid>,
) -> Result<ApiResponse<SessionDetail>, AppError> {
    let detail = session::start(&ctx, claims.user_id, thesis_id).await?;
    Ok(ApiResponse::ok("session started", detail))
}

pub async fn join(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Path(session_id): Path<Uuid>,
) -> Result<ApiResponse<SessionDetail>, AppError> {
    let detail = session::join(&ctx, claims.user_id, session_id).await?;
    Ok(ApiResponse::ok("session joined", detail))
}

pub async fn leave(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Path(session_id): Path<Uuid>,
) -> Result<ApiResponse<SessionDetail>, AppError> {
    let detail = session::leave(&ctx, claims.user_id, session_id).await?;
    Ok(ApiResponse::ok("session left", detail))
}

pub async fn end(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Path(session_id): Path<Uuid>,
) -> Result<ApiResponse<SessionDetail>, AppError> {
    let detail = session::end(&ctx, claims.user_id, session_id).await?;
    Ok(ApiResponse::ok("session ended", detail))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub status: Option<String>,
    pub month: Option<u32>,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub per_page: u64,
    /// `pagination=false` returns the full unpaged list.
    pub pagination: Option<String>,
}

/// Parse and validate the filter portion of the query string.
pub(crate) fn parse_filter(query: &ListQuery) -> Result<SessionFilter, AppError> {
    let sort = match query.sort.as_deref() {
        None | Some("latest") => SortOrder::Latest,
        Some("oldest") => SortOrder::Oldest,
        Some(other) => {
            return Err(AppError::Validation(format!("unknown sort: {other}")))
        }
    };
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<SessionStatus>())
        .transpose()
        .map_err(AppError::Validation)?;
    if let Some(month) = query.month {
        if !(1..=12).contains(&month) {
            return Err(AppError::Validation(format!(
                "month must be 1..=12, got {month}"
            )));
        }
    }
    Ok(SessionFilter {
        sort,
        status,
        month: query.month,
    })
}

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Query(query): Query<ListQuery>,
) -> Result<ApiResponse<Vec<SessionDetail>>, AppError> {
    let filter = parse_filter(&query)?;
    let unpaged = query.pagination.as_deref() == Some("false");

    if unpaged {
        let (details, _) = session::list(&ctx, claims.user_id, &filter, None).await?;
        return Ok(ApiResponse::ok("sessions listed", details));
    }

    let page = PageRequest {
        page: query.page,
        per_page: query.per_page,
    };
    let (details, count) = session::list(&ctx, claims.user_id, &filter, Some(page)).await?;
    Ok(ApiResponse::ok_paged(
        "sessions listed",
        details,
        Meta::from_page(page, count),
    ))
}

pub async fn detail(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Path(session_id): Path<Uuid>,
) -> Result<ApiResponse<SessionDetail>, AppError> {
    let detail = session::detail(&ctx, claims.user_id, session_id).await?;
    Ok(ApiResponse::ok("session detail", detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sort: Option<&str>, status: Option<&str>, month: Option<u32>) -> ListQuery {
        ListQuery {
            sort: sort.map(String::from),
            status: status.map(String::from),
            month,
            page: 0,
            per_page: 0,
            pagination: None,
        }
    }

    #[test]
    fn default_sort_is_latest() {
        let filter = parse_filter(&query(None, None, None)).unwrap();
        assert_eq!(filter.sort, SortOrder::Latest);
        assert!(filter.status.is_none());
    }

    #[test]
    fn invalid_sort_and_month_are_rejected() {
        assert!(parse_filter(&query(Some("sideways"), None, None)).is_err());
        assert!(parse_filter(&query(None, None, Some(0))).is_err());
        assert!(parse_filter(&query(None, None, Some(13))).is_err());
        assert!(parse_filter(&query(None, None, Some(12))).is_ok());
    }

    #[test]
    fn status_filter_parses_the_lifecycle_names() {
        let filter = parse_filter(&query(None, Some("ongoing"), None)).unwrap();
        assert_eq!(filter.status, Some(SessionStatus::Ongoing));
        assert!(parse_filter(&query(None, Some("nonsense"), None)).is_err());
    }
}
