// rest/routes/messages.rs — send + paged listing for one session's chat.

use crate::chat::{self, SendMessageRequest};
use crate::error::AppError;
use crate::events::MessageEvent;
use crate::pagination::PageRequest;
use crate::rest::auth::AuthedUser;
use crate::rest::envelope::{ApiResponse, Meta};
use crate::AppContext;
use axum::extract::{Path, Query, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

pub async fn send(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<ApiResponse<MessageEvent>, AppError> {
    let event = chat::send(&ctx, claims.user_id, session_id, body).await?;
    Ok(ApiResponse::ok("message sent", event))
}

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    AuthedUser(claims): AuthedUser,
    Path(session_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> Result<ApiResponse<Vec<MessageEvent>>, AppError> {
    let (events, count) = chat::list(&ctx, claims.user_id, session_id, page).await?;
    Ok(ApiResponse::ok_paged(
        "messages listed",
        events,
        Meta::from_page(page, count),
    ))
}
