//! Notification rows: append-only except for the read flag.

use super::{with_timeout, Storage};
use crate::error::AppError;
use crate::pagination::PageRequest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn create_notification(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO notifications (id, user_id, title, message, is_read) VALUES ($1, $2, $3, $4, FALSE)",
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Newest-first page of a user's notifications plus the total count.
    pub async fn notifications_page(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<NotificationRecord>, u64), AppError> {
        with_timeout(async {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await?;

            let norm = page.normalize();
            let rows: Vec<NotificationRecord> = sqlx::query_as(
                "SELECT id, user_id, title, message, is_read, created_at
                 FROM notifications WHERE user_id = $1
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(user_id)
            .bind(norm.per_page as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

            Ok((rows, count as u64))
        })
        .await
    }

    /// Fetch one of the caller's notifications and mark it read in the same
    /// statement. Another user's notification id behaves as absent.
    pub async fn notification_mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<NotificationRecord>, AppError> {
        let row: Option<NotificationRecord> = sqlx::query_as(
            "UPDATE notifications SET is_read = TRUE
             WHERE id = $1 AND user_id = $2
             RETURNING id, user_id, title, message, is_read, created_at",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
