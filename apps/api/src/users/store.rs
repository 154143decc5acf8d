use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{UserRole, UserRow};

pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub skills: Vec<String>,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Default)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub skills: Option<Vec<String>>,
}

pub async fn insert_user(pool: &PgPool, user: NewUser) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (id, email, display_name, role, headline, location, company, skills)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&user.email)
    .bind(&user.display_name)
    .bind(user.role.as_str())
    .bind(&user.headline)
    .bind(&user.location)
    .bind(&user.company)
    .bind(&user.skills)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::from_insert(e, &format!("Email {} is already registered", user.email)))
}

pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
}

/// Loads a user and checks their role.
pub async fn require_role(pool: &PgPool, id: Uuid, role: UserRole) -> Result<UserRow, AppError> {
    let user = get_user(pool, id).await?;
    if user.role() != role {
        return Err(AppError::Forbidden(format!(
            "User {id} must be a {role} for this action"
        )));
    }
    Ok(user)
}

pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    patch: ProfilePatch,
) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users SET
            display_name = COALESCE($2, display_name),
            headline     = COALESCE($3, headline),
            location     = COALESCE($4, location),
            company      = COALESCE($5, company),
            skills       = COALESCE($6, skills),
            updated_at   = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&patch.display_name)
    .bind(&patch.headline)
    .bind(&patch.location)
    .bind(&patch.company)
    .bind(&patch.skills)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
}
