use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub s3_key: String,
    pub raw_text: String,
    pub parsed: Value,
    pub extraction_stage: String,
    pub parse_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
