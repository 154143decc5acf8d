use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{UserRole, UserRow};
use crate::state::AppState;
use crate::users::store::{self, NewUser, ProfilePatch};
use crate::users::validation::{clean_optional, is_valid_email, normalize_skills, require_non_empty};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Email and role are immutable and therefore absent.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub skills: Option<Vec<String>>,
}

impl CreateUserRequest {
    fn validate(self) -> Result<NewUser, AppError> {
        let email = self.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::Validation(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        Ok(NewUser {
            email,
            display_name: require_non_empty("display_name", &self.display_name)?,
            role: self.role,
            headline: clean_optional(self.headline),
            location: clean_optional(self.location),
            company: clean_optional(self.company),
            skills: normalize_skills(&self.skills),
        })
    }
}

impl UpdateProfileRequest {
    fn validate(self) -> Result<ProfilePatch, AppError> {
        let display_name = match self.display_name {
            Some(name) => Some(require_non_empty("display_name", &name)?),
            None => None,
        };
        Ok(ProfilePatch {
            display_name,
            headline: clean_optional(self.headline),
            location: clean_optional(self.location),
            company: clean_optional(self.company),
            skills: self.skills.map(normalize_skills),
        })
    }
}

/// POST /api/v1/users
pub async fn handle_create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserRow>), AppError> {
    let new_user = req.validate()?;
    let user = store::insert_user(&state.db, new_user).await?;
    tracing::info!("Created {} {}", user.role, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserRow>, AppError> {
    Ok(Json(store::get_user(&state.db, id).await?))
}

/// PATCH /api/v1/users/:id
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserRow>, AppError> {
    let patch = req.validate()?;
    Ok(Json(store::update_profile(&state.db, id, patch).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, name: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            display_name: name.to_string(),
            role: UserRole::Applicant,
            headline: Some("   ".to_string()),
            location: None,
            company: None,
            skills: vec!["Rust".into(), "rust".into()],
        }
    }

    #[test]
    fn test_create_request_normalizes_fields() {
        let user = request(" Jane@Example.COM ", " Jane ").validate().unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.display_name, "Jane");
        assert_eq!(user.headline, None);
        assert_eq!(user.skills, vec!["Rust"]);
    }

    #[test]
    fn test_create_request_rejects_bad_email() {
        assert!(matches!(
            request("nope", "Jane").validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_create_request_rejects_blank_name() {
        assert!(request("a@b.io", " ").validate().is_err());
    }

    #[test]
    fn test_role_deserializes_snake_case() {
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "email": "r@corp.io",
            "display_name": "Rita",
            "role": "recruiter"
        }))
        .unwrap();
        assert_eq!(req.role, UserRole::Recruiter);
        assert!(req.skills.is_empty());
    }

    #[test]
    fn test_update_request_rejects_blank_name() {
        let req = UpdateProfileRequest {
            display_name: Some("".into()),
            headline: None,
            location: None,
            company: None,
            skills: None,
        };
        assert!(req.validate().is_err());
    }
}
