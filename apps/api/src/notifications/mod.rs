pub mod handlers;
pub mod store;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::notification::{NotificationKind, NotificationRow};
use crate::realtime::{RealtimeHub, RealtimeKind};

/// Call-to-action attached to a notification. URL and label always travel together.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallToAction {
    pub url: String,
    pub label: String,
}

impl CallToAction {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

/// A notification to be delivered.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub cta: Option<CallToAction>,
}

/// Stores a notification and pushes it to the user's realtime stream.
pub async fn notify(
    pool: &PgPool,
    hub: &RealtimeHub,
    notification: NewNotification,
) -> Result<NotificationRow, AppError> {
    let row = store::insert_notification(pool, &notification).await?;
    match serde_json::to_value(&row) {
        Ok(payload) => hub.publish(row.user_id, RealtimeKind::Notification, payload),
        Err(e) => warn!("Failed to serialize notification {} for realtime: {e}", row.id),
    }
    Ok(row)
}

/// Side-effect notification: a delivery failure is logged and never fails the caller.
pub async fn notify_best_effort(pool: &PgPool, hub: &RealtimeHub, notification: NewNotification) {
    let user_id = notification.user_id;
    let kind = notification.kind;
    if let Err(e) = notify(pool, hub, notification).await {
        warn!(
            "Failed to deliver {} notification to user {user_id}: {e}",
            kind.as_str()
        );
    }
}
