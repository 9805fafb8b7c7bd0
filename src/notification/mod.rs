//! Notification reads: the caller's list and the detail view, which marks
//! the row as read as a side effect.

use crate::error::AppError;
use crate::pagination::PageRequest;
use crate::storage::NotificationRecord;
use crate::AppContext;
use uuid::Uuid;

/// Newest-first page of the caller's notifications plus the total count.
pub async fn list(
    ctx: &AppContext,
    caller_id: Uuid,
    page: PageRequest,
) -> Result<(Vec<NotificationRecord>, u64), AppError> {
    ctx.storage.notifications_page(caller_id, page).await
}

/// Fetch one notification and mark it read. Another user's notification id
/// is indistinguishable from a missing one.
pub async fn detail(
    ctx: &AppContext,
    caller_id: Uuid,
    id: Uuid,
) -> Result<NotificationRecord, AppError> {
    ctx.storage
        .notification_mark_read(id, caller_id)
        .await?
        .ok_or(AppError::NotFound("notification"))
}
