use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::store::get_job;
use crate::models::notification::NotificationKind;
use crate::models::resume::ResumeRow;
use crate::notifications::{notify_best_effort, CallToAction, NewNotification};
use crate::resume::enhancement::{enhance, EnhancementResult};
use crate::resume::extraction::normalize::normalize_text;
use crate::resume::extraction::Document;
use crate::resume::matching::{score_cached, MatchInput, MatchReport};
use crate::resume::models::{ParseOutcome, ParsedResume};
use crate::resume::parser::parse_resume;
use crate::resume::store::{self, NewResume};
use crate::resume::validation::validate_parsed;
use crate::state::AppState;
use crate::users::store::get_user;

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub resume: ResumeRow,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParsedRequest {
    pub user_id: Uuid,
    pub parsed: ParsedResume,
}

#[derive(Debug, Deserialize)]
pub struct ParseTextRequest {
    pub text: String,
}

/// Body of the enhance and match endpoints: one resume source and one job source.
#[derive(Debug, Default, Deserialize)]
pub struct ResumeJobRequest {
    pub user_id: Option<Uuid>,
    pub resume_id: Option<Uuid>,
    pub parsed: Option<ParsedResume>,
    pub job_id: Option<Uuid>,
    pub job_description: Option<String>,
}

#[derive(Debug)]
enum ResumeSource {
    Stored { id: Uuid, user_id: Uuid },
    Inline(ParsedResume),
}

#[derive(Debug, PartialEq)]
enum JobSource {
    Stored(Uuid),
    Inline(String),
}

impl ResumeJobRequest {
    fn into_sources(self) -> Result<(ResumeSource, JobSource), AppError> {
        let resume = match (self.resume_id, self.parsed) {
            (Some(_), Some(_)) => {
                return Err(AppError::Validation(
                    "Provide either resume_id or parsed, not both".to_string(),
                ))
            }
            (Some(id), None) => {
                let user_id = self.user_id.ok_or_else(|| {
                    AppError::Validation("user_id is required with resume_id".to_string())
                })?;
                ResumeSource::Stored { id, user_id }
            }
            (None, Some(parsed)) => ResumeSource::Inline(parsed),
            (None, None) => {
                return Err(AppError::Validation(
                    "Either resume_id or parsed is required".to_string(),
                ))
            }
        };

        let description = self
            .job_description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let job = match (self.job_id, description) {
            (Some(_), Some(_)) => {
                return Err(AppError::Validation(
                    "Provide either job_id or job_description, not both".to_string(),
                ))
            }
            (Some(id), None) => JobSource::Stored(id),
            (None, Some(description)) => JobSource::Inline(description),
            (None, None) => {
                return Err(AppError::Validation(
                    "Either job_id or a non-empty job_description is required".to_string(),
                ))
            }
        };

        Ok((resume, job))
    }
}

/// Structured resume plus the text it is scored against.
struct ResolvedResume {
    parsed: ParsedResume,
    text: String,
}

async fn resolve_resume(state: &AppState, source: ResumeSource) -> Result<ResolvedResume, AppError> {
    match source {
        ResumeSource::Stored { id, user_id } => {
            let row = store::get_owned_resume(&state.db, id, user_id).await?;
            Ok(ResolvedResume {
                parsed: stored_parsed(&row)?,
                text: row.raw_text,
            })
        }
        ResumeSource::Inline(parsed) => {
            let report = validate_parsed(parsed);
            if !report.usable {
                return Err(AppError::UnprocessableEntity(
                    "Resume needs at least a name, email, skill or experience entry".to_string(),
                ));
            }
            let text = report.resume.to_plain_text();
            Ok(ResolvedResume {
                parsed: report.resume,
                text,
            })
        }
    }
}

async fn resolve_job(state: &AppState, source: JobSource) -> Result<String, AppError> {
    match source {
        JobSource::Stored(id) => Ok(get_job(&state.db, id).await?.description_for_matching()),
        JobSource::Inline(description) => Ok(description),
    }
}

pub(crate) fn stored_parsed(row: &ResumeRow) -> Result<ParsedResume, AppError> {
    serde_json::from_value(row.parsed.clone()).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("stored resume {} is not decodable: {e}", row.id))
    })
}

fn to_json(resume: &ParsedResume) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(resume).map_err(|e| AppError::Internal(e.into()))
}

// ────────────────────────────────────────────────────────────────────────────
// Upload
// ────────────────────────────────────────────────────────────────────────────

struct UploadForm {
    user_id: Uuid,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Malformed multipart body: {}", e.body_text()))
    }
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut user_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_id") => {
                let raw = field.text().await.map_err(multipart_error)?;
                let id = raw
                    .trim()
                    .parse::<Uuid>()
                    .map_err(|_| AppError::Validation(format!("Invalid user_id '{raw}'")))?;
                user_id = Some(id);
            }
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, content_type, bytes));
            }
            _ => {}
        }
    }

    let user_id =
        user_id.ok_or_else(|| AppError::Validation("Missing 'user_id' form field".to_string()))?;
    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' form field".to_string()))?;

    Ok(UploadForm {
        user_id,
        file_name,
        content_type,
        bytes,
    })
}

/// POST /api/v1/resumes
///
/// Multipart upload (`user_id`, `file`): extract → parse → store original → insert row.
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeResponse>), AppError> {
    let form = read_upload_form(multipart).await?;
    let doc = Document::from_upload(
        form.bytes,
        form.file_name.as_deref(),
        form.content_type.as_deref(),
        state.config.max_upload_bytes,
    )?;
    get_user(&state.db, form.user_id).await?;

    let extracted = state.extraction.run(&doc).await?;
    let outcome = parse_resume(&state.llm, &extracted.text).await;

    let id = Uuid::new_v4();
    let s3_key = store::object_key(form.user_id, id, &doc.file_name);
    let content_type = doc.kind.mime_type();
    store::put_original(
        &state.s3,
        &state.config.s3_bucket,
        &s3_key,
        content_type,
        doc.bytes.clone(),
    )
    .await?;

    let inserted = store::insert_resume(
        &state.db,
        NewResume {
            id,
            user_id: form.user_id,
            file_name: doc.file_name.clone(),
            content_type: content_type.to_string(),
            s3_key: s3_key.clone(),
            raw_text: extracted.text,
            parsed: to_json(&outcome.resume)?,
            extraction_stage: extracted.stage.to_string(),
            parse_method: outcome.method.as_str().to_string(),
        },
    )
    .await;
    let resume = match inserted {
        Ok(resume) => resume,
        Err(e) => {
            if let Err(cleanup) =
                store::delete_original(&state.s3, &state.config.s3_bucket, &s3_key).await
            {
                warn!("Orphaned resume original {s3_key}: {cleanup}");
            }
            return Err(e);
        }
    };

    info!(
        resume_id = %resume.id,
        stage = extracted.stage,
        method = outcome.method.as_str(),
        "Resume processed for user {}",
        resume.user_id
    );

    notify_best_effort(
        &state.db,
        &state.realtime,
        NewNotification {
            user_id: resume.user_id,
            kind: NotificationKind::ResumeProcessed,
            title: "Your resume is ready".to_string(),
            body: format!(
                "{} was read with {} skills and {} positions. Review the details before applying.",
                resume.file_name,
                outcome.resume.skills.len(),
                outcome.resume.experience.len()
            ),
            cta: Some(CallToAction::new(
                format!("/resumes/{}", resume.id),
                "Review resume",
            )),
        },
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ResumeResponse {
            resume,
            warnings: outcome.warnings,
        }),
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// CRUD
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/resumes?user_id=
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    Ok(Json(store::list_resumes(&state.db, params.user_id).await?))
}

/// GET /api/v1/resumes/:id?user_id=
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeRow>, AppError> {
    Ok(Json(
        store::get_owned_resume(&state.db, id, params.user_id).await?,
    ))
}

/// PUT /api/v1/resumes/:id/parsed
pub async fn handle_update_parsed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateParsedRequest>,
) -> Result<Json<ResumeResponse>, AppError> {
    let report = validate_parsed(req.parsed);
    if !report.usable {
        return Err(AppError::UnprocessableEntity(
            "Corrected resume needs at least a name, email, skill or experience entry".to_string(),
        ));
    }

    store::get_owned_resume(&state.db, id, req.user_id).await?;
    let resume = store::update_parsed(&state.db, id, &to_json(&report.resume)?).await?;
    info!("Resume {id} corrected by user {}", req.user_id);
    Ok(Json(ResumeResponse {
        resume,
        warnings: report.warnings,
    }))
}

/// DELETE /api/v1/resumes/:id?user_id=
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    let resume = store::get_owned_resume(&state.db, id, params.user_id).await?;
    store::delete_resume(&state.db, id).await?;
    if let Err(e) = store::delete_original(&state.s3, &state.config.s3_bucket, &resume.s3_key).await
    {
        warn!("Resume {id} deleted but its original remains: {e}");
    }
    info!("Resume {id} deleted by user {}", params.user_id);
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// AI endpoints
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resumes/parse-text
///
/// Parses raw resume text without storing anything.
pub async fn handle_parse_text(
    State(state): State<AppState>,
    Json(req): Json<ParseTextRequest>,
) -> Result<Json<ParseOutcome>, AppError> {
    let text = normalize_text(&req.text);
    if text.is_empty() {
        return Err(AppError::Validation("text must not be empty".to_string()));
    }
    Ok(Json(parse_resume(&state.llm, &text).await))
}

/// POST /api/v1/resumes/enhance
pub async fn handle_enhance(
    State(state): State<AppState>,
    Json(req): Json<ResumeJobRequest>,
) -> Result<Json<EnhancementResult>, AppError> {
    let (resume_source, job_source) = req.into_sources()?;
    let resume = resolve_resume(&state, resume_source).await?;
    let job_description = resolve_job(&state, job_source).await?;
    Ok(Json(enhance(&state.llm, &resume.parsed, &job_description).await))
}

/// POST /api/v1/resumes/match
pub async fn handle_match(
    State(state): State<AppState>,
    Json(req): Json<ResumeJobRequest>,
) -> Result<Json<MatchReport>, AppError> {
    let (resume_source, job_source) = req.into_sources()?;
    let resume = resolve_resume(&state, resume_source).await?;
    let job_description = resolve_job(&state, job_source).await?;

    let input = MatchInput {
        resume: &resume.parsed,
        resume_text: &resume.text,
        job_description: &job_description,
    };
    let report = score_cached(state.match_scorer.as_ref(), &state.match_cache, &input).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> ResumeJobRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_stored_resume_requires_user_id() {
        let err = request(json!({
            "resume_id": Uuid::new_v4(),
            "job_description": "Rust engineer"
        }))
        .into_sources()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("user_id")));
    }

    #[test]
    fn test_inline_sources() {
        let (resume, job) = request(json!({
            "parsed": {"full_name": "Jane Doe", "skills": ["Rust"]},
            "job_description": "  Rust engineer  "
        }))
        .into_sources()
        .unwrap();
        match resume {
            ResumeSource::Inline(parsed) => assert_eq!(parsed.skills, vec!["Rust"]),
            other => panic!("unexpected source: {other:?}"),
        }
        assert_eq!(job, JobSource::Inline("Rust engineer".into()));
    }

    #[test]
    fn test_blank_job_description_is_missing() {
        let err = request(json!({
            "parsed": {"full_name": "Jane Doe"},
            "job_description": "   "
        }))
        .into_sources()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_both_sources_rejected() {
        let user = Uuid::new_v4();
        let err = request(json!({
            "user_id": user,
            "resume_id": Uuid::new_v4(),
            "parsed": {"full_name": "Jane Doe"},
            "job_id": Uuid::new_v4()
        }))
        .into_sources()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("not both")));

        let err = request(json!({
            "parsed": {"full_name": "Jane Doe"},
            "job_id": Uuid::new_v4(),
            "job_description": "Rust"
        }))
        .into_sources()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("job_id")));
    }

    #[test]
    fn test_stored_sources() {
        let user = Uuid::new_v4();
        let resume_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();
        let (resume, job) = request(json!({
            "user_id": user,
            "resume_id": resume_id,
            "job_id": job_id
        }))
        .into_sources()
        .unwrap();
        match resume {
            ResumeSource::Stored { id, user_id } => {
                assert_eq!(id, resume_id);
                assert_eq!(user_id, user);
            }
            other => panic!("unexpected source: {other:?}"),
        }
        assert_eq!(job, JobSource::Stored(job_id));
    }

    #[test]
    fn test_stored_parsed_decodes_partial_json() {
        let row = ResumeRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            file_name: "cv.pdf".into(),
            content_type: "application/pdf".into(),
            s3_key: "resumes/x".into(),
            raw_text: "Jane".into(),
            parsed: json!({"full_name": "Jane Doe", "phone": 4915123456789_i64}),
            extraction_stage: "native".into(),
            parse_method: "llm".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let parsed = stored_parsed(&row).unwrap();
        assert_eq!(parsed.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(parsed.phone.as_deref(), Some("4915123456789"));
    }
}
