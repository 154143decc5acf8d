use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{EmploymentType, JobRow, JobStatus};

pub struct NewJob {
    pub recruiter_id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub employment_type: EmploymentType,
    pub description: String,
    pub requirements: Vec<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub remote: bool,
}

/// `None` leaves a column as is. For nullable columns `Some(None)` clears it.
#[derive(Default)]
pub struct JobPatch {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<Option<String>>,
    pub employment_type: Option<EmploymentType>,
    pub description: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub salary_min: Option<Option<i32>>,
    pub salary_max: Option<Option<i32>>,
    pub remote: Option<bool>,
    pub status: Option<JobStatus>,
}

#[derive(Debug, Default)]
pub struct JobFilter {
    pub q: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub remote: Option<bool>,
    pub status: JobStatus,
    pub recruiter_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

/// Wraps a user search term for ILIKE, escaping the pattern metacharacters.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub async fn insert_job(pool: &PgPool, job: NewJob) -> Result<JobRow, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs
            (id, recruiter_id, title, company, location, employment_type, description,
             requirements, salary_min, salary_max, remote, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'open')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job.recruiter_id)
    .bind(&job.title)
    .bind(&job.company)
    .bind(&job.location)
    .bind(job.employment_type.as_str())
    .bind(&job.description)
    .bind(&job.requirements)
    .bind(job.salary_min)
    .bind(job.salary_max)
    .bind(job.remote)
    .fetch_one(pool)
    .await?)
}

pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<JobRow, AppError> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// Loads a job and checks that `recruiter_id` owns it.
pub async fn get_owned_job(pool: &PgPool, id: Uuid, recruiter_id: Uuid) -> Result<JobRow, AppError> {
    let job = get_job(pool, id).await?;
    if job.recruiter_id != recruiter_id {
        return Err(AppError::Forbidden(format!(
            "Job {id} belongs to another recruiter"
        )));
    }
    Ok(job)
}

/// Newest first. Free-text `q` matches title, company or description.
pub async fn list_jobs(pool: &PgPool, filter: &JobFilter) -> Result<Vec<JobRow>, AppError> {
    let q = filter.q.as_deref().map(like_pattern);
    let location = filter.location.as_deref().map(like_pattern);

    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        SELECT * FROM jobs
        WHERE status = $1
          AND ($2::text IS NULL OR title ILIKE $2 OR company ILIKE $2 OR description ILIKE $2)
          AND ($3::text IS NULL OR location ILIKE $3)
          AND ($4::text IS NULL OR employment_type = $4)
          AND ($5::boolean IS NULL OR remote = $5)
          AND ($6::uuid IS NULL OR recruiter_id = $6)
        ORDER BY created_at DESC
        LIMIT $7 OFFSET $8
        "#,
    )
    .bind(filter.status.as_str())
    .bind(q)
    .bind(location)
    .bind(filter.employment_type.map(|t| t.as_str()))
    .bind(filter.remote)
    .bind(filter.recruiter_id)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?)
}

pub async fn update_job(pool: &PgPool, id: Uuid, patch: JobPatch) -> Result<JobRow, AppError> {
    sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            title           = COALESCE($2, title),
            company         = COALESCE($3, company),
            location        = CASE WHEN $4 THEN $5 ELSE location END,
            employment_type = COALESCE($6, employment_type),
            description     = COALESCE($7, description),
            requirements    = COALESCE($8, requirements),
            salary_min      = CASE WHEN $9 THEN $10 ELSE salary_min END,
            salary_max      = CASE WHEN $11 THEN $12 ELSE salary_max END,
            remote          = COALESCE($13, remote),
            status          = COALESCE($14, status),
            updated_at      = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&patch.title)
    .bind(&patch.company)
    .bind(patch.location.is_some())
    .bind(patch.location.flatten())
    .bind(patch.employment_type.map(|t| t.as_str()))
    .bind(&patch.description)
    .bind(&patch.requirements)
    .bind(patch.salary_min.is_some())
    .bind(patch.salary_min.flatten())
    .bind(patch.salary_max.is_some())
    .bind(patch.salary_max.flatten())
    .bind(patch.remote)
    .bind(patch.status.map(|s| s.as_str()))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_wraps_and_trims() {
        assert_eq!(like_pattern("  rust "), "%rust%");
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("100%_c\\d"), "%100\\%\\_c\\\\d%");
    }
}
