//! Canonical message history: the worker's idempotent batch insert and the
//! paged read used once a session is finished.

use super::{with_timeout, Storage};
use crate::error::AppError;
use crate::events::{MessageEvent, SenderSummary, NEW_MESSAGE_EVENT};
use crate::pagination::PageRequest;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    session_id: Uuid,
    sender_user_id: Uuid,
    sender_role: String,
    is_text: bool,
    text: String,
    file_url: Option<String>,
    file_type: Option<String>,
    parent_message_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    sender_name: String,
    sender_identifier: String,
}

impl MessageRow {
    fn into_event(self) -> MessageEvent {
        MessageEvent {
            event: NEW_MESSAGE_EVENT.to_string(),
            message_id: self.id,
            is_text: self.is_text,
            text: self.text,
            file_url: self.file_url,
            file_type: self.file_type,
            sender: SenderSummary {
                id: self.sender_user_id,
                name: self.sender_name,
                identifier: self.sender_identifier,
                role: self.sender_role,
            },
            session_id: self.session_id,
            parent_message_id: self.parent_message_id,
            timestamp: self.created_at,
        }
    }
}

impl Storage {
    /// Persist a finalized session's messages in one transaction.
    ///
    /// Idempotent on message id: a redelivered summary task inserts zero new
    /// rows. Returns how many rows were actually inserted.
    pub async fn insert_messages(
        &self,
        session_id: Uuid,
        messages: &[MessageEvent],
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for msg in messages {
            let result = sqlx::query(
                r#"
                INSERT INTO messages
                    (id, session_id, sender_user_id, sender_role, is_text, text,
                     file_url, file_type, parent_message_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(msg.message_id)
            .bind(session_id)
            .bind(msg.sender.id)
            .bind(&msg.sender.role)
            .bind(msg.is_text)
            .bind(&msg.text)
            .bind(&msg.file_url)
            .bind(&msg.file_type)
            .bind(msg.parent_message_id)
            .bind(msg.timestamp)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Newest-first page of a finished session's history, plus the total
    /// count. Shape matches the live-buffer read so clients see one format.
    pub async fn messages_page(
        &self,
        session_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<MessageEvent>, u64), AppError> {
        with_timeout(async {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE session_id = $1")
                    .bind(session_id)
                    .fetch_one(&self.pool)
                    .await?;

            let norm = page.normalize();
            let rows: Vec<MessageRow> = sqlx::query_as(
                r#"
                SELECT m.id, m.session_id, m.sender_user_id, m.sender_role, m.is_text, m.text,
                       m.file_url, m.file_type, m.parent_message_id, m.created_at,
                       COALESCE(s.name, l.name, '') AS sender_name,
                       COALESCE(s.nim, l.nip, '') AS sender_identifier
                FROM messages m
                JOIN users u ON u.id = m.sender_user_id
                LEFT JOIN students s ON s.id = u.student_id
                LEFT JOIN lecturers l ON l.id = u.lecturer_id
                WHERE m.session_id = $1
                ORDER BY m.created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(session_id)
            .bind(norm.per_page as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

            Ok((
                rows.into_iter().map(MessageRow::into_event).collect(),
                count as u64,
            ))
        })
        .await
    }
}
