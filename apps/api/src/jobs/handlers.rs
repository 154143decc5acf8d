use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Deserializer};
use tracing::info;
use uuid::Uuid;

use crate::applications::store::active_applicant_ids;
use crate::errors::AppError;
use crate::jobs::store::{self, JobFilter, JobPatch, NewJob};
use crate::models::job::{EmploymentType, JobRow, JobStatus};
use crate::models::notification::NotificationKind;
use crate::models::user::UserRole;
use crate::notifications::{notify_best_effort, CallToAction, NewNotification};
use crate::state::AppState;
use crate::users::store::require_role;
use crate::users::validation::{clean_optional, require_non_empty};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub recruiter_id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub employment_type: EmploymentType,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    #[serde(default)]
    pub remote: bool,
}

/// Absent fields are left alone; `null` clears `location` and the salary bounds.
#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub recruiter_id: Uuid,
    pub title: Option<String>,
    pub company: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub location: Option<Option<String>>,
    pub employment_type: Option<EmploymentType>,
    pub description: Option<String>,
    pub requirements: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub salary_min: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    pub salary_max: Option<Option<i32>>,
    pub remote: Option<bool>,
    pub status: Option<JobStatus>,
}

/// Marks a field as present, so an explicit `null` becomes `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct RecruiterBody {
    pub recruiter_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub q: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub remote: Option<bool>,
    pub status: Option<JobStatus>,
    pub recruiter_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<JobListQuery> for JobFilter {
    fn from(query: JobListQuery) -> Self {
        JobFilter {
            q: clean_optional(query.q),
            location: clean_optional(query.location),
            employment_type: query.employment_type,
            remote: query.remote,
            status: query.status.unwrap_or_default(),
            recruiter_id: query.recruiter_id,
            limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: query.offset.unwrap_or(0).max(0),
        }
    }
}

fn validate_salary(min: Option<i32>, max: Option<i32>) -> Result<(), AppError> {
    if min.is_some_and(|v| v < 0) || max.is_some_and(|v| v < 0) {
        return Err(AppError::Validation("salary bounds cannot be negative".to_string()));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(AppError::Validation(format!(
                "salary_min ({min}) cannot exceed salary_max ({max})"
            )));
        }
    }
    Ok(())
}

fn clean_requirements(requirements: Vec<String>) -> Vec<String> {
    requirements
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

impl CreateJobRequest {
    fn validate(self) -> Result<NewJob, AppError> {
        validate_salary(self.salary_min, self.salary_max)?;
        Ok(NewJob {
            recruiter_id: self.recruiter_id,
            title: require_non_empty("title", &self.title)?,
            company: require_non_empty("company", &self.company)?,
            location: clean_optional(self.location),
            employment_type: self.employment_type,
            description: require_non_empty("description", &self.description)?,
            requirements: clean_requirements(self.requirements),
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            remote: self.remote,
        })
    }
}

impl UpdateJobRequest {
    /// True when the request does nothing but change the status.
    fn is_status_only(&self) -> bool {
        self.title.is_none()
            && self.company.is_none()
            && self.location.is_none()
            && self.employment_type.is_none()
            && self.description.is_none()
            && self.requirements.is_none()
            && self.salary_min.is_none()
            && self.salary_max.is_none()
            && self.remote.is_none()
    }

    /// Validates the patch against the current row.
    fn validate(self, current: &JobRow) -> Result<JobPatch, AppError> {
        if !current.is_open() && !(self.is_status_only() && self.status == Some(JobStatus::Open))
        {
            return Err(AppError::UnprocessableEntity(format!(
                "Job {} is closed; re-open it before editing",
                current.id
            )));
        }

        validate_salary(
            self.salary_min.unwrap_or(current.salary_min),
            self.salary_max.unwrap_or(current.salary_max),
        )?;

        let non_empty = |field: &str, value: Option<String>| -> Result<Option<String>, AppError> {
            value.map(|v| require_non_empty(field, &v)).transpose()
        };

        Ok(JobPatch {
            title: non_empty("title", self.title)?,
            company: non_empty("company", self.company)?,
            location: self.location.map(clean_optional),
            employment_type: self.employment_type,
            description: non_empty("description", self.description)?,
            requirements: self.requirements.map(clean_requirements),
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            remote: self.remote,
            status: self.status,
        })
    }
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    let new_job = req.validate()?;
    require_role(&state.db, new_job.recruiter_id, UserRole::Recruiter).await?;
    let job = store::insert_job(&state.db, new_job).await?;
    info!("Recruiter {} posted job {}", job.recruiter_id, job.id);
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let filter = JobFilter::from(query);
    Ok(Json(store::list_jobs(&state.db, &filter).await?))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    Ok(Json(store::get_job(&state.db, id).await?))
}

/// PATCH /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<JobRow>, AppError> {
    let current = store::get_owned_job(&state.db, id, req.recruiter_id).await?;
    let closing = current.is_open() && req.status == Some(JobStatus::Closed);
    let patch = req.validate(&current)?;
    let job = store::update_job(&state.db, id, patch).await?;
    if closing {
        notify_job_closed(&state, &job).await?;
    }
    Ok(Json(job))
}

/// POST /api/v1/jobs/:id/close
pub async fn handle_close_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RecruiterBody>,
) -> Result<Json<JobRow>, AppError> {
    let current = store::get_owned_job(&state.db, id, req.recruiter_id).await?;
    if !current.is_open() {
        return Ok(Json(current));
    }

    let job = store::update_job(
        &state.db,
        id,
        JobPatch {
            status: Some(JobStatus::Closed),
            ..Default::default()
        },
    )
    .await?;
    info!("Job {} closed by recruiter {}", job.id, req.recruiter_id);
    notify_job_closed(&state, &job).await?;
    Ok(Json(job))
}

async fn notify_job_closed(state: &AppState, job: &JobRow) -> Result<(), AppError> {
    let applicants = active_applicant_ids(&state.db, job.id).await?;
    for applicant_id in applicants {
        notify_best_effort(
            &state.db,
            &state.realtime,
            NewNotification {
                user_id: applicant_id,
                kind: NotificationKind::JobClosed,
                title: format!("{} is no longer accepting applications", job.title),
                body: format!(
                    "{} closed the {} posting. Your application remains on record.",
                    job.company, job.title
                ),
                cta: Some(CallToAction::new(format!("/jobs/{}", job.id), "View job")),
            },
        )
        .await;
    }
    Ok(())
}
