use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::notification::NotificationRow;
use crate::notifications::store;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct NotificationListQuery {
    pub user_id: Uuid,
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct UserIdBody {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// GET /api/v1/notifications
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<NotificationListQuery>,
) -> Result<Json<Vec<NotificationRow>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let rows =
        store::list_notifications(&state.db, params.user_id, params.unread_only, limit).await?;
    Ok(Json(rows))
}

/// GET /api/v1/notifications/unread-count
pub async fn handle_unread_count(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = store::unread_count(&state.db, params.user_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// POST /api/v1/notifications/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UserIdBody>,
) -> Result<Json<NotificationRow>, AppError> {
    Ok(Json(store::mark_read(&state.db, id, req.user_id).await?))
}

/// POST /api/v1/notifications/read-all
pub async fn handle_mark_all_read(
    State(state): State<AppState>,
    Json(req): Json<UserIdBody>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = store::mark_all_read(&state.db, req.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// DELETE /api/v1/notifications/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    store::delete_notification(&state.db, id, params.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
