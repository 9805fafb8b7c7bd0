// rest/routes/notifications.rs — the caller's notification feed.

use crate::error::AppError;
use crate::notification;
use crate::pagination::PageRequest;
use crate::rest::auth::AuthedUser;
use crate::rest::envelope::{ApiResponse, Meta};
use crate::storage::NotificationRecord;
use crate::AppContext;
use axum::extract::{Path, Query, State};
use std::sync::Arc;
use uuid::Uuid;

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Query(page): Query<PageRequest>,
) -> Result<ApiResponse<Vec<NotificationRecord>>, AppError> {
    let (notifications, count) = notification::list(&ctx, claims.user_id, page).await?;
    Ok(ApiResponse::ok_paged(
        "notifications listed",
        notifications,
        Meta::from_page(page, count),
    ))
}

/// Detail view; marks the notification as read.
pub async fn detail(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<NotificationRecord>, AppError> {
    let record = notification::detail(&ctx, claims.user_id, id).await?;
    Ok(ApiResponse::ok("notification detail", record))
}
