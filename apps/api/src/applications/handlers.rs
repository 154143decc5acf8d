use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::status::ApplicationStatus;
use crate::applications::store::{self, NewApplication};
use crate::errors::AppError;
use crate::jobs::store::{get_job, get_owned_job};
use crate::models::application::{ApplicationEventRow, ApplicationRow};
use crate::models::job::JobRow;
use crate::models::notification::NotificationKind;
use crate::models::resume::ResumeRow;
use crate::models::user::UserRole;
use crate::notifications::{notify_best_effort, CallToAction, NewNotification};
use crate::resume::handlers::stored_parsed;
use crate::resume::matching::{score_cached, MatchInput};
use crate::resume::store::{get_owned_resume, get_resume};
use crate::state::AppState;
use crate::users::store::require_role;
use crate::users::validation::clean_optional;

const MAX_COVER_LETTER_CHARS: usize = 10_000;
const MAX_NOTE_CHARS: usize = 2_000;

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub job_id: Uuid,
    pub applicant_id: Uuid,
    pub resume_id: Option<Uuid>,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicantQuery {
    pub applicant_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RecruiterQuery {
    pub recruiter_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub recruiter_id: Uuid,
    pub status: ApplicationStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub applicant_id: Uuid,
}

/// Application with its status history and, when attached, the resume.
#[derive(Debug, Serialize)]
pub struct ApplicationDetail {
    pub application: ApplicationRow,
    pub events: Vec<ApplicationEventRow>,
    pub resume: Option<ResumeRow>,
}

fn check_length(field: &str, value: Option<String>, max: usize) -> Result<Option<String>, AppError> {
    let value = clean_optional(value);
    if let Some(v) = &value {
        let len = v.chars().count();
        if len > max {
            return Err(AppError::Validation(format!(
                "{field} is {len} characters; the limit is {max}"
            )));
        }
    }
    Ok(value)
}

fn current_status(application: &ApplicationRow) -> Result<ApplicationStatus, AppError> {
    application
        .status
        .parse()
        .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))
}

/// Computes and stores the match report. Failures leave the application unscored.
async fn score_application(
    state: &AppState,
    application: ApplicationRow,
    job: &JobRow,
    resume: &ResumeRow,
) -> ApplicationRow {
    let scored = async {
        let parsed = stored_parsed(resume)?;
        let job_description = job.description_for_matching();
        let input = MatchInput {
            resume: &parsed,
            resume_text: &resume.raw_text,
            job_description: &job_description,
        };
        let report = score_cached(state.match_scorer.as_ref(), &state.match_cache, &input).await?;
        let value = serde_json::to_value(&report).map_err(|e| AppError::Internal(e.into()))?;
        store::set_match(&state.db, application.id, report.overall_score as i32, &value).await
    }
    .await;

    match scored {
        Ok(row) => {
            info!(
                application_id = %row.id,
                score = row.match_score,
                "Application scored"
            );
            row
        }
        Err(e) => {
            warn!("Could not score application {}: {e}", application.id);
            application
        }
    }
}

/// POST /api/v1/applications
pub async fn handle_apply(
    State(state): State<AppState>,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<ApplicationRow>), AppError> {
    let cover_letter = check_length("cover_letter", req.cover_letter, MAX_COVER_LETTER_CHARS)?;
    let applicant = require_role(&state.db, req.applicant_id, UserRole::Applicant).await?;

    let job = get_job(&state.db, req.job_id).await?;
    if !job.is_open() {
        return Err(AppError::UnprocessableEntity(format!(
            "Job {} is closed to new applications",
            job.id
        )));
    }

    let resume = match req.resume_id {
        Some(id) => Some(get_owned_resume(&state.db, id, applicant.id).await?),
        None => None,
    };

    let application = store::insert_application(
        &state.db,
        NewApplication {
            job_id: job.id,
            applicant_id: applicant.id,
            resume_id: resume.as_ref().map(|r| r.id),
            cover_letter,
        },
    )
    .await?;
    info!("Applicant {} applied to job {}", applicant.id, job.id);

    let application = match &resume {
        Some(resume) => score_application(&state, application, &job, resume).await,
        None => application,
    };

    notify_best_effort(
        &state.db,
        &state.realtime,
        NewNotification {
            user_id: job.recruiter_id,
            kind: NotificationKind::ApplicationReceived,
            title: format!("New application for {}", job.title),
            body: match application.match_score {
                Some(score) => format!("{} applied (match score {score}).", applicant.display_name),
                None => format!("{} applied.", applicant.display_name),
            },
            cta: Some(CallToAction::new(
                format!("/applications/{}", application.id),
                "Review application",
            )),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/applications?applicant_id=
pub async fn handle_list_for_applicant(
    State(state): State<AppState>,
    Query(params): Query<ApplicantQuery>,
) -> Result<Json<Vec<ApplicationRow>>, AppError> {
    Ok(Json(
        store::list_for_applicant(&state.db, params.applicant_id).await?,
    ))
}

/// GET /api/v1/jobs/:id/applications?recruiter_id=
pub async fn handle_list_for_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(params): Query<RecruiterQuery>,
) -> Result<Json<Vec<ApplicationRow>>, AppError> {
    get_owned_job(&state.db, job_id, params.recruiter_id).await?;
    Ok(Json(store::list_for_job(&state.db, job_id).await?))
}

/// GET /api/v1/applications/:id?user_id=
///
/// Visible to the applicant and to the recruiter who owns the job.
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ViewerQuery>,
) -> Result<Json<ApplicationDetail>, AppError> {
    let application = store::get_application(&state.db, id).await?;
    if application.applicant_id != params.user_id {
        let job = get_job(&state.db, application.job_id).await?;
        if job.recruiter_id != params.user_id {
            return Err(AppError::Forbidden(format!(
                "User {} cannot view application {id}",
                params.user_id
            )));
        }
    }

    let events = store::list_events(&state.db, id).await?;
    let resume = match application.resume_id {
        Some(resume_id) => match get_resume(&state.db, resume_id).await {
            Ok(resume) => Some(resume),
            Err(AppError::NotFound(_)) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };

    Ok(Json(ApplicationDetail {
        application,
        events,
        resume,
    }))
}

/// PATCH /api/v1/applications/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApplicationRow>, AppError> {
    let note = check_length("note", req.note, MAX_NOTE_CHARS)?;
    let application = store::get_application(&state.db, id).await?;
    let job = get_owned_job(&state.db, application.job_id, req.recruiter_id).await?;

    let from = current_status(&application)?;
    if !from.recruiter_can_move_to(req.status) {
        return Err(AppError::UnprocessableEntity(format!(
            "Cannot move application from {from} to {}",
            req.status
        )));
    }

    let updated = store::transition(
        &state.db,
        id,
        req.recruiter_id,
        from,
        req.status,
        note.as_deref(),
    )
    .await?;
    info!("Application {id} moved {from} -> {}", req.status);

    notify_best_effort(
        &state.db,
        &state.realtime,
        NewNotification {
            user_id: updated.applicant_id,
            kind: NotificationKind::ApplicationStatus,
            title: format!("Update on your {} application", job.title),
            body: format!(
                "Your application to {} at {} {}",
                job.title,
                job.company,
                req.status.describe()
            ),
            cta: Some(CallToAction::new(
                format!("/applications/{}", updated.id),
                "View application",
            )),
        },
    )
    .await;

    Ok(Json(updated))
}

/// POST /api/v1/applications/:id/withdraw
pub async fn handle_withdraw(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<ApplicationRow>, AppError> {
    let application = store::get_application(&state.db, id).await?;
    if application.applicant_id != req.applicant_id {
        return Err(AppError::Forbidden(format!(
            "Application {id} belongs to another applicant"
        )));
    }

    let from = current_status(&application)?;
    if !from.applicant_can_withdraw() {
        return Err(AppError::UnprocessableEntity(format!(
            "Application {id} is already {from}"
        )));
    }

    let updated = store::transition(
        &state.db,
        id,
        req.applicant_id,
        from,
        ApplicationStatus::Withdrawn,
        None,
    )
    .await?;
    info!("Application {id} withdrawn by applicant {}", req.applicant_id);
    Ok(Json(updated))
}
