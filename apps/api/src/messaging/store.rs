use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::messaging::canonical_pair;
use crate::models::messaging::{ConversationRow, ConversationSummaryRow, MessageRow};

/// Returns the conversation for the pair and job context, creating it if needed.
/// The flag is true when a new conversation was created.
pub async fn find_or_create_conversation(
    pool: &PgPool,
    user_a: Uuid,
    user_b: Uuid,
    job_id: Option<Uuid>,
) -> Result<(ConversationRow, bool), AppError> {
    let (participant_a, participant_b) = canonical_pair(user_a, user_b);

    let created = sqlx::query_as::<_, ConversationRow>(
        r#"
        INSERT INTO conversations (id, participant_a, participant_b, job_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(participant_a)
    .bind(participant_b)
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = created {
        return Ok((row, true));
    }

    let existing = sqlx::query_as::<_, ConversationRow>(
        r#"
        SELECT * FROM conversations
        WHERE participant_a = $1 AND participant_b = $2 AND job_id IS NOT DISTINCT FROM $3
        "#,
    )
    .bind(participant_a)
    .bind(participant_b)
    .bind(job_id)
    .fetch_one(pool)
    .await?;
    Ok((existing, false))
}

pub async fn get_conversation(pool: &PgPool, id: Uuid) -> Result<ConversationRow, AppError> {
    sqlx::query_as::<_, ConversationRow>("SELECT * FROM conversations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversation {id} not found")))
}

/// Loads a conversation and checks that `user_id` takes part in it.
pub async fn get_participating_conversation(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<ConversationRow, AppError> {
    let conversation = get_conversation(pool, id).await?;
    if !conversation.has_participant(user_id) {
        return Err(AppError::Forbidden(format!(
            "User {user_id} is not a participant in conversation {id}"
        )));
    }
    Ok(conversation)
}

/// Inserts the message and bumps the conversation's `last_message_at` in one transaction.
pub async fn insert_message(
    pool: &PgPool,
    conversation_id: Uuid,
    sender_id: Uuid,
    body: &str,
) -> Result<MessageRow, AppError> {
    let mut tx = pool.begin().await?;

    let message = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO messages (id, conversation_id, sender_id, body)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(conversation_id)
    .bind(sender_id)
    .bind(body)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
        .bind(conversation_id)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(message)
}

/// Conversations of `user_id`, most recent activity first, with unread counts.
pub async fn list_conversations(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ConversationSummaryRow>, AppError> {
    Ok(sqlx::query_as::<_, ConversationSummaryRow>(
        r#"
        SELECT c.*,
               (SELECT COUNT(*) FROM messages m
                WHERE m.conversation_id = c.id
                  AND m.sender_id <> $1
                  AND m.read_at IS NULL) AS unread_count
        FROM conversations c
        WHERE c.participant_a = $1 OR c.participant_b = $1
        ORDER BY COALESCE(c.last_message_at, c.created_at) DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// One page of messages older than `before` (newest page when absent), oldest first.
pub async fn list_messages(
    pool: &PgPool,
    conversation_id: Uuid,
    before: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<MessageRow>, AppError> {
    let mut page = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT * FROM messages
        WHERE conversation_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(conversation_id)
    .bind(before)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    page.reverse();
    Ok(page)
}

/// Marks every unread message from the other participant as read.
pub async fn mark_read(pool: &PgPool, conversation_id: Uuid, user_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE messages SET read_at = now()
        WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL
        "#,
    )
    .bind(conversation_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
