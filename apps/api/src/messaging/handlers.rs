use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::store::get_job;
use crate::messaging::{store, validate_body};
use crate::models::messaging::{ConversationRow, ConversationSummaryRow, MessageRow};
use crate::models::notification::NotificationKind;
use crate::notifications::{notify_best_effort, CallToAction, NewNotification};
use crate::realtime::RealtimeKind;
use crate::state::AppState;
use crate::users::store::get_user;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
const PREVIEW_CHARS: usize = 140;

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub user_id: Uuid,
    pub other_user_id: Uuid,
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MessagePageQuery {
    pub user_id: Uuid,
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UserIdBody {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

/// First `PREVIEW_CHARS` characters of a message, with an ellipsis when cut.
fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// POST /api/v1/conversations
///
/// Idempotent: the same pair and job context always yields the same conversation.
pub async fn handle_start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<ConversationRow>), AppError> {
    if req.user_id == req.other_user_id {
        return Err(AppError::Validation(
            "You cannot start a conversation with yourself".to_string(),
        ));
    }
    get_user(&state.db, req.user_id).await?;
    get_user(&state.db, req.other_user_id).await?;
    if let Some(job_id) = req.job_id {
        get_job(&state.db, job_id).await?;
    }

    let (conversation, created) =
        store::find_or_create_conversation(&state.db, req.user_id, req.other_user_id, req.job_id)
            .await?;
    if created {
        info!(
            "Conversation {} started between {} and {}",
            conversation.id, req.user_id, req.other_user_id
        );
        Ok((StatusCode::CREATED, Json(conversation)))
    } else {
        Ok((StatusCode::OK, Json(conversation)))
    }
}

/// GET /api/v1/conversations?user_id=
pub async fn handle_list_conversations(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<ConversationSummaryRow>>, AppError> {
    Ok(Json(
        store::list_conversations(&state.db, params.user_id).await?,
    ))
}

/// GET /api/v1/conversations/:id/messages?user_id=&before=&limit=
pub async fn handle_list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<MessagePageQuery>,
) -> Result<Json<Vec<MessageRow>>, AppError> {
    store::get_participating_conversation(&state.db, id, params.user_id).await?;
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    Ok(Json(
        store::list_messages(&state.db, id, params.before, limit).await?,
    ))
}

/// POST /api/v1/conversations/:id/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageRow>), AppError> {
    let body = validate_body(&req.body)?;
    let conversation = store::get_participating_conversation(&state.db, id, req.sender_id).await?;
    let recipient = conversation.other_participant(req.sender_id);

    let message = store::insert_message(&state.db, id, req.sender_id, &body).await?;

    match serde_json::to_value(&message) {
        Ok(payload) => state.realtime.publish(recipient, RealtimeKind::Message, payload),
        Err(e) => warn!("Failed to serialize message {} for realtime: {e}", message.id),
    }

    let sender_name = match get_user(&state.db, req.sender_id).await {
        Ok(sender) => sender.display_name,
        Err(e) => {
            warn!("Could not load sender {} for notification: {e}", req.sender_id);
            "Someone".to_string()
        }
    };
    notify_best_effort(
        &state.db,
        &state.realtime,
        NewNotification {
            user_id: recipient,
            kind: NotificationKind::NewMessage,
            title: format!("New message from {sender_name}"),
            body: preview(&message.body),
            cta: Some(CallToAction::new(
                format!("/messages/{}", conversation.id),
                "Open conversation",
            )),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/v1/conversations/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UserIdBody>,
) -> Result<Json<MarkReadResponse>, AppError> {
    store::get_participating_conversation(&state.db, id, req.user_id).await?;
    let updated = store::mark_read(&state.db, id, req.user_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}
