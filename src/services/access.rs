// src/services/access.rs

//! Who may read or change an exam.
//!
//! Retrieval rules are evaluated in order:
//! 1. the owner sees everything;
//! 2. a user whose category equals the exam's group sees everything;
//! 3. the first whitelist pattern matching the user's email grants redacted access,
//!    but only inside `[start_date, start_date + duration]`;
//! 4. everyone else is refused.

use chrono::{DateTime, Utc};

use crate::{error::AppError, models::exam::Exam, utils::glob::glob_match};

pub const NOT_STARTED: &str =
    "The exam has not started yet. You cannot access it before the start time.";
pub const NOT_AUTHORIZED: &str = "You are not authorized to view this exam.";
pub const NOT_OWNER: &str = "You do not have permission to perform this action.";
pub const ALREADY_STARTED: &str = "Cannot update an exam that has already started.";

/// The user asking for an exam, reduced to what the rules look at.
#[derive(Debug, Clone, Copy)]
pub struct Viewer<'a> {
    pub id: i64,
    pub email: &'a str,
    pub category: Option<&'a str>,
}

/// How much of the exam the viewer gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Full,
    /// Whitelisted viewer: answer correctness is masked.
    Redacted,
}

fn is_owner(exam: &Exam, viewer: &Viewer<'_>) -> bool {
    exam.user_id == viewer.id
}

fn shares_group(exam: &Exam, viewer: &Viewer<'_>) -> bool {
    match (exam.group_name.as_deref(), viewer.category) {
        (Some(group), Some(category)) => !group.is_empty() && group == category,
        _ => false,
    }
}

/// First whitelist entry matching the viewer's email, if any.
pub fn matching_pattern<'e>(exam: &'e Exam, email: &str) -> Option<&'e str> {
    exam.whitelist
        .iter()
        .map(String::as_str)
        .find(|pattern| glob_match(pattern, email))
}

/// Decides whether `viewer` may retrieve `exam` at `now`.
pub fn decide(exam: &Exam, viewer: &Viewer<'_>, now: DateTime<Utc>) -> Result<Access, AppError> {
    if is_owner(exam, viewer) || shares_group(exam, viewer) {
        return Ok(Access::Full);
    }

    if matching_pattern(exam, viewer.email).is_some() {
        if now < exam.start_date {
            return Err(AppError::Forbidden(NOT_STARTED.to_string()));
        }
        if now > exam.ends_at() {
            return Err(AppError::Forbidden(NOT_AUTHORIZED.to_string()));
        }
        return Ok(Access::Redacted);
    }

    Err(AppError::Forbidden(NOT_AUTHORIZED.to_string()))
}

/// Same audience as `decide`, without the time window. Used for exam metadata
/// (e.g. its duration) that participants need before the exam opens.
pub fn ensure_participant(exam: &Exam, viewer: &Viewer<'_>) -> Result<(), AppError> {
    if is_owner(exam, viewer)
        || shares_group(exam, viewer)
        || matching_pattern(exam, viewer.email).is_some()
    {
        Ok(())
    } else {
        Err(AppError::Forbidden(NOT_AUTHORIZED.to_string()))
    }
}

/// Only the owner may change or delete an exam.
pub fn ensure_owner(exam: &Exam, user_id: i64) -> Result<(), AppError> {
    if exam.user_id != user_id {
        return Err(AppError::Forbidden(NOT_OWNER.to_string()));
    }
    Ok(())
}

/// Exams are frozen once they have started.
pub fn ensure_editable(exam: &Exam, now: DateTime<Utc>) -> Result<(), AppError> {
    if exam.has_started(now) {
        return Err(AppError::BadRequest(ALREADY_STARTED.to_string()));
    }
    Ok(())
}
