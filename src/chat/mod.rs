// SPDX-License-Identifier: MIT
//! Message ingress and the dual-source listing.
//!
//! Send: validate → mint id → append to the live buffer → fan out. Exactly
//! one buffer append per turn and zero durable rows until the session ends.
//! List: the live buffer while `ongoing`, the durable store once
//! `finished`; `waiting`/`processing_summary` are not readable.

use crate::error::AppError;
use crate::events::{recipients, MessageEvent, SenderSummary, NEW_MESSAGE_EVENT};
use crate::model::{ParticipantKind, SessionStatus};
use crate::pagination::PageRequest;
use crate::AppContext;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// Body of `POST /sessions/{id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub is_text: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    /// Accepted unvalidated; consumers tolerate dangling references.
    #[serde(default)]
    pub parent_message_id: Option<Uuid>,
}

impl SendMessageRequest {
    /// A text turn must carry text; a file turn must carry a file URL.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.is_text && self.text.is_empty() {
            return Err(AppError::Validation("text message with empty text".into()));
        }
        if !self.is_text && self.file_url.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::Validation("file message without file_url".into()));
        }
        Ok(())
    }
}

/// Ingest one chat turn into an ongoing session.
pub async fn send(
    ctx: &AppContext,
    caller_id: Uuid,
    session_id: Uuid,
    req: SendMessageRequest,
) -> Result<MessageEvent, AppError> {
    req.validate()?;

    let caller = ctx
        .storage
        .user_by_id(caller_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let session = ctx
        .storage
        .session_by_id(session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    match session.status {
        SessionStatus::Waiting => return Err(AppError::NotStarted),
        SessionStatus::ProcessingSummary | SessionStatus::Finished => {
            return Err(AppError::Finished)
        }
        SessionStatus::Ongoing => {}
    }

    let set = ctx
        .storage
        .participant_set(session.thesis_id)
        .await?
        .ok_or(AppError::NotFound("thesis"))?;
    let sender = set.get(caller_id).ok_or(AppError::Unauthorized)?;
    let sender_role = match sender.kind {
        ParticipantKind::Student => "student",
        ParticipantKind::Supervisor(_) => "lecturer",
    };

    let event = MessageEvent {
        event: NEW_MESSAGE_EVENT.to_string(),
        message_id: Uuid::new_v4(),
        is_text: req.is_text,
        text: req.text,
        file_url: req.file_url,
        file_type: req.file_type,
        sender: SenderSummary {
            id: caller.id,
            name: sender.name.clone(),
            identifier: sender.identifier.clone(),
            role: sender_role.to_string(),
        },
        session_id,
        parent_message_id: req.parent_message_id,
        timestamp: Utc::now(),
    };

    // The buffer append precedes the fan-out, so per-receiver delivery order
    // matches buffer order (the router is FIFO per socket).
    ctx.buffer.append(session_id, &event).await?;
    ctx.metrics.inc_messages_buffered();
    info!(
        message_id = %event.message_id,
        session_id = %session_id,
        "message buffered"
    );

    let payload = serde_json::to_string(&event)?;
    for recipient in recipients(&set, caller_id) {
        // Offline receivers are skipped — chat replay comes from the buffer,
        // not from notifications.
        ctx.router.deliver_or_drop(recipient.user_id, &payload).await;
    }

    Ok(event)
}

/// Paged listing: newest first, from whichever store currently owns the
/// session's messages.
pub async fn list(
    ctx: &AppContext,
    caller_id: Uuid,
    session_id: Uuid,
    page: PageRequest,
) -> Result<(Vec<MessageEvent>, u64), AppError> {
    caller_ok(ctx, caller_id).await?;
    let session = ctx
        .storage
        .session_by_id(session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;

    match session.status {
        SessionStatus::Ongoing => ctx.buffer.read_page(session_id, page).await,
        SessionStatus::Finished => ctx.storage.messages_page(session_id, page).await,
        SessionStatus::Waiting | SessionStatus::ProcessingSummary => {
            Err(AppError::InvalidStatus)
        }
    }
}

async fn caller_ok(ctx: &AppContext, caller_id: Uuid) -> Result<(), AppError> {
    ctx.storage
        .user_by_id(caller_id)
        .await?
        .map(|_| ())
        .ok_or(AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_requires_text() {
        let req = SendMessageRequest {
            is_text: true,
            text: String::new(),
            file_url: None,
            file_type: None,
            parent_message_id: None,
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn file_message_requires_file_url() {
        let req = SendMessageRequest {
            is_text: false,
            text: String::new(),
            file_url: None,
            file_type: Some("application/pdf".into()),
            parent_message_id: None,
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));

        let req = SendMessageRequest {
            is_text: false,
            text: String::new(),
            file_url: Some("https://files.example/scan.pdf".into()),
            file_type: Some("application/pdf".into()),
            parent_message_id: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn dangling_parent_is_accepted_at_validation() {
        let req = SendMessageRequest {
            is_text: true,
            text: "re: your comment".into(),
            file_url: None,
            file_type: None,
            parent_message_id: Some(Uuid::new_v4()),
        };
        assert!(req.validate().is_ok());
    }
}
