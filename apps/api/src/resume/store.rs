use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::resume::models::ParseMethod;

pub struct NewResume {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub s3_key: String,
    pub raw_text: String,
    pub parsed: Value,
    pub extraction_stage: String,
    pub parse_method: String,
}

/// `resumes/<user_id>/<resume_id>/<file name>`; path separators in the name are replaced.
pub fn object_key(user_id: Uuid, resume_id: Uuid, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') || c.is_control() { '_' } else { c })
        .collect();
    format!("resumes/{user_id}/{resume_id}/{safe}")
}

pub async fn put_original(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    content_type: &str,
    bytes: Bytes,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(bytes))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;
    info!("Uploaded resume original to s3://{bucket}/{key}");
    Ok(())
}

pub async fn delete_original(s3: &S3Client, bucket: &str, key: &str) -> Result<(), AppError> {
    s3.delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("delete of {key} failed: {e}")))?;
    Ok(())
}

pub async fn insert_resume(pool: &PgPool, resume: NewResume) -> Result<ResumeRow, AppError> {
    Ok(sqlx::query_as::<_, ResumeRow>(
        r#"
        INSERT INTO resumes
            (id, user_id, file_name, content_type, s3_key, raw_text, parsed,
             extraction_stage, parse_method)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(resume.id)
    .bind(resume.user_id)
    .bind(&resume.file_name)
    .bind(&resume.content_type)
    .bind(&resume.s3_key)
    .bind(&resume.raw_text)
    .bind(&resume.parsed)
    .bind(&resume.extraction_stage)
    .bind(&resume.parse_method)
    .fetch_one(pool)
    .await?)
}

pub async fn get_resume(pool: &PgPool, id: Uuid) -> Result<ResumeRow, AppError> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// Loads a resume and checks that `user_id` owns it.
pub async fn get_owned_resume(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<ResumeRow, AppError> {
    let resume = get_resume(pool, id).await?;
    if resume.user_id != user_id {
        return Err(AppError::Forbidden(format!(
            "Resume {id} belongs to another user"
        )));
    }
    Ok(resume)
}

pub async fn list_resumes(pool: &PgPool, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
    Ok(sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Replaces the structured resume with user corrections.
pub async fn update_parsed(pool: &PgPool, id: Uuid, parsed: &Value) -> Result<ResumeRow, AppError> {
    sqlx::query_as::<_, ResumeRow>(
        r#"
        UPDATE resumes
        SET parsed = $2, parse_method = $3, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(parsed)
    .bind(ParseMethod::Manual.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// Deletes the row; applications referencing it keep their score (FK is `ON DELETE SET NULL`).
pub async fn delete_resume(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM resumes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_sanitizes_file_name() {
        let user = Uuid::nil();
        let resume = Uuid::nil();
        assert_eq!(
            object_key(user, resume, "../cv\\final.pdf"),
            format!("resumes/{user}/{resume}/.._cv_final.pdf")
        );
    }
}
