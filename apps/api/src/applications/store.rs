use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::applications::status::ApplicationStatus;
use crate::errors::AppError;
use crate::models::application::{ApplicationEventRow, ApplicationRow};

pub struct NewApplication {
    pub job_id: Uuid,
    pub applicant_id: Uuid,
    pub resume_id: Option<Uuid>,
    pub cover_letter: Option<String>,
}

/// Inserts the application together with its initial `submitted` event.
pub async fn insert_application(
    pool: &PgPool,
    application: NewApplication,
) -> Result<ApplicationRow, AppError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ApplicationRow>(
        r#"
        INSERT INTO applications (id, job_id, applicant_id, resume_id, cover_letter, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application.job_id)
    .bind(application.applicant_id)
    .bind(application.resume_id)
    .bind(&application.cover_letter)
    .bind(ApplicationStatus::Submitted.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::from_insert(e, "You have already applied to this job"))?;

    insert_event(
        &mut tx,
        row.id,
        application.applicant_id,
        None,
        ApplicationStatus::Submitted,
        None,
    )
    .await?;

    tx.commit().await?;
    Ok(row)
}

async fn insert_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    application_id: Uuid,
    actor_id: Uuid,
    from: Option<ApplicationStatus>,
    to: ApplicationStatus,
    note: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO application_events (id, application_id, actor_id, from_status, to_status, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(actor_id)
    .bind(from.map(|s| s.as_str()))
    .bind(to.as_str())
    .bind(note)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn get_application(pool: &PgPool, id: Uuid) -> Result<ApplicationRow, AppError> {
    sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
}

pub async fn list_events(
    pool: &PgPool,
    application_id: Uuid,
) -> Result<Vec<ApplicationEventRow>, AppError> {
    Ok(sqlx::query_as::<_, ApplicationEventRow>(
        "SELECT * FROM application_events WHERE application_id = $1 ORDER BY created_at ASC",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await?)
}

pub async fn list_for_applicant(
    pool: &PgPool,
    applicant_id: Uuid,
) -> Result<Vec<ApplicationRow>, AppError> {
    Ok(sqlx::query_as::<_, ApplicationRow>(
        "SELECT * FROM applications WHERE applicant_id = $1 ORDER BY created_at DESC",
    )
    .bind(applicant_id)
    .fetch_all(pool)
    .await?)
}

/// Best match first; unscored applications last, oldest first among equals.
pub async fn list_for_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<ApplicationRow>, AppError> {
    Ok(sqlx::query_as::<_, ApplicationRow>(
        r#"
        SELECT * FROM applications
        WHERE job_id = $1
        ORDER BY match_score DESC NULLS LAST, created_at ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?)
}

/// Applicants whose application on `job_id` is still in a non-terminal state.
pub async fn active_applicant_ids(pool: &PgPool, job_id: Uuid) -> Result<Vec<Uuid>, AppError> {
    Ok(sqlx::query_scalar(
        r#"
        SELECT applicant_id FROM applications
        WHERE job_id = $1 AND status NOT IN ('hired', 'rejected', 'withdrawn')
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?)
}

/// Moves an application from `from` to `to` and records the event.
/// The update is conditional on the current status so concurrent changes cannot both win.
pub async fn transition(
    pool: &PgPool,
    id: Uuid,
    actor_id: Uuid,
    from: ApplicationStatus,
    to: ApplicationStatus,
    note: Option<&str>,
) -> Result<ApplicationRow, AppError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ApplicationRow>(
        r#"
        UPDATE applications SET status = $3, updated_at = now()
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(from.as_str())
    .bind(to.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        AppError::Conflict(format!(
            "Application {id} changed status concurrently; reload and retry"
        ))
    })?;

    insert_event(&mut tx, id, actor_id, Some(from), to, note).await?;
    tx.commit().await?;
    Ok(row)
}

pub async fn set_match(
    pool: &PgPool,
    id: Uuid,
    score: i32,
    report: &Value,
) -> Result<ApplicationRow, AppError> {
    Ok(sqlx::query_as::<_, ApplicationRow>(
        r#"
        UPDATE applications SET match_score = $2, match_report = $3, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(score)
    .bind(report)
    .fetch_one(pool)
    .await?)
}
