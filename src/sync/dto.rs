//! Upstream wire payloads. Never constructed by hand outside the mapper —
//! this is the anti-corruption boundary's "dirty" side.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorDto>,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDto {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StudentDto {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: Option<String>,
    pub xp: i64,
    #[serde(default)]
    pub cohort: Option<String>,
    #[serde(default)]
    pub pool: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_online: bool,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootcampNodeDto {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user_xp: i64,
    #[serde(default)]
    pub children: Vec<BootcampNodeDto>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaskCompletionDto {
    pub task_id: Option<String>,
    pub task_slug: Option<String>,
    pub student_id: String,
    pub status: String,
    pub xp_earned: i64,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default)]
    pub time_spent: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_attempts() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeaderboardEntryDto {
    pub student_id: String,
    pub login: String,
    pub xp: i64,
    pub rank: u32,
}

#[derive(Debug, Deserialize)]
pub struct SyncDeltaDto {
    pub students: Vec<StudentDto>,
    #[serde(default)]
    pub task_completions: Vec<TaskCompletionDto>,
    #[serde(default)]
    pub deleted_student_ids: Vec<String>,
    pub next_sync_token: String,
    #[serde(default)]
    pub full_sync_required: bool,
}
