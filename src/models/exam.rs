// src/models/exam.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::question::{QuestionBody, QuestionResponse, validate_questions};

/// Column list shared by every query that loads a full `Exam` row.
pub const EXAM_COLUMNS: &str = "id, user_id, title, duration_minutes, exam_code, created_at, \
     expiration_date, whitelist, start_date, group_name";

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Exam {
    pub id: i64,

    /// Owning instructor.
    pub user_id: i64,

    pub title: String,

    /// Length of the sitting, in minutes.
    pub duration_minutes: i32,

    /// Unique access code used in every exam URL.
    pub exam_code: String,

    pub created_at: DateTime<Utc>,

    pub expiration_date: DateTime<Utc>,

    /// Email glob patterns, e.g. `["alice@uni.edu", "*@cs.uni.edu"]`.
    pub whitelist: Json<Vec<String>>,

    pub start_date: DateTime<Utc>,

    /// Users whose category equals this name get full access.
    pub group_name: Option<String>,
}

impl Exam {
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    /// End of the sitting window (`start_date + duration`).
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.start_date + self.duration()
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_date < now
    }
}

/// Full exam as returned to the owner, group members and (redacted) whitelisted users.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExamResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    /// Minutes.
    pub duration: i32,
    pub exam_code: String,
    pub created_at: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub whitelist: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub group_name: Option<String>,
    pub questions: Vec<QuestionResponse>,
}

impl ExamResponse {
    pub fn new(exam: Exam, questions: Vec<QuestionResponse>) -> Self {
        Self {
            id: exam.id,
            user_id: exam.user_id,
            title: exam.title,
            duration: exam.duration_minutes,
            exam_code: exam.exam_code,
            created_at: exam.created_at,
            expiration_date: exam.expiration_date,
            whitelist: exam.whitelist.0,
            start_date: exam.start_date,
            group_name: exam.group_name,
            questions,
        }
    }
}

/// Exam without its questions, used in listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExamSummary {
    pub id: i64,
    pub title: String,
    pub duration: i32,
    pub exam_code: String,
    pub created_at: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub group_name: Option<String>,
    pub whitelist: Vec<String>,
}

impl From<Exam> for ExamSummary {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            duration: exam.duration_minutes,
            exam_code: exam.exam_code,
            created_at: exam.created_at,
            expiration_date: exam.expiration_date,
            start_date: exam.start_date,
            group_name: exam.group_name,
            whitelist: exam.whitelist.0,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExamDurationResponse {
    pub exam_id: i64,
    /// Minutes.
    pub duration: i32,
}

/// DTO for creating an exam.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Minutes.
    #[validate(range(min = 1, max = 10080))]
    pub duration: i32,
    /// Generated when omitted.
    #[validate(length(min = 4, max = 100), custom(function = validate_exam_code))]
    pub exam_code: Option<String>,
    pub start_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    #[serde(default)]
    #[validate(custom(function = validate_whitelist))]
    pub whitelist: Vec<String>,
    #[validate(length(max = 100))]
    pub group_name: Option<String>,
    #[serde(default)]
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<QuestionBody>,
}

/// DTO for replacing an exam (PUT). The exam code never changes.
/// Questions are replaced only when the field is present.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 10080))]
    pub duration: i32,
    pub start_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    #[serde(default)]
    #[validate(custom(function = validate_whitelist))]
    pub whitelist: Vec<String>,
    #[validate(length(max = 100))]
    pub group_name: Option<String>,
    #[validate(custom(function = validate_questions))]
    pub questions: Option<Vec<QuestionBody>>,
}

/// DTO for partially updating an exam (PATCH). An empty `group_name` clears it.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct PatchExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(range(min = 1, max = 10080))]
    pub duration: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    #[validate(custom(function = validate_whitelist))]
    pub whitelist: Option<Vec<String>>,
    #[validate(length(max = 100))]
    pub group_name: Option<String>,
    #[validate(custom(function = validate_questions))]
    pub questions: Option<Vec<QuestionBody>>,
}

impl PatchExamRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.duration.is_none()
            && self.start_date.is_none()
            && self.expiration_date.is_none()
            && self.whitelist.is_none()
            && self.group_name.is_none()
            && self.questions.is_none()
    }
}

/// Exam codes end up in URLs, so keep them to a safe alphabet.
fn validate_exam_code(code: &str) -> Result<(), validator::ValidationError> {
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(validator::ValidationError::new("invalid_exam_code"));
    }
    Ok(())
}

fn validate_whitelist(entries: &[String]) -> Result<(), validator::ValidationError> {
    if entries.len() > 1000 {
        return Err(validator::ValidationError::new("whitelist_too_long"));
    }
    for entry in entries {
        if entry.trim().is_empty() || entry.len() > 254 {
            return Err(validator::ValidationError::new("invalid_whitelist_entry"));
        }
    }
    Ok(())
}

/// Rejects an expiration that precedes the start of the exam.
pub fn check_schedule(
    start_date: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
) -> Result<(), crate::error::AppError> {
    if expiration_date < start_date {
        return Err(crate::error::AppError::BadRequest(
            "expiration_date must not be before start_date".to_string(),
        ));
    }
    Ok(())
}
