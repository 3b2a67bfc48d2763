// src/handlers/exams.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::auth::fetch_user,
    models::{
        exam::{
            CreateExamRequest, EXAM_COLUMNS, Exam, ExamDurationResponse, ExamResponse,
            ExamSummary, PatchExamRequest, UpdateExamRequest, check_schedule,
        },
        question::{Question, QuestionBody, QuestionResponse},
    },
    services::{
        access::{self, Access, Viewer},
        notification::Notifier,
        quota,
    },
    utils::jwt::CurrentUser,
};

pub const NOT_INSTRUCTOR: &str = "Only instructors can create exams.";

/// Loads an exam by its access code.
pub async fn fetch_exam_by_code(pool: &PgPool, exam_code: &str) -> Result<Exam, AppError> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE exam_code = $1"
    ))
    .bind(exam_code)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found.".to_string()))
}

async fn fetch_questions(pool: &PgPool, exam_id: i64) -> Result<Vec<QuestionResponse>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, exam_id, position, body FROM questions WHERE exam_id = $1 ORDER BY position, id",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;

    Ok(questions.into_iter().map(QuestionResponse::from).collect())
}

/// Inserts question bodies in order, stored exactly as authored.
async fn insert_questions(
    conn: &mut PgConnection,
    exam_id: i64,
    bodies: Vec<QuestionBody>,
) -> Result<Vec<QuestionResponse>, AppError> {
    let mut inserted = Vec::with_capacity(bodies.len());

    for (position, body) in bodies.into_iter().enumerate() {
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (exam_id, position, body)
            VALUES ($1, $2, $3)
            RETURNING id, exam_id, position, body
            "#,
        )
        .bind(exam_id)
        .bind(position as i32)
        .bind(SqlJson(body))
        .fetch_one(&mut *conn)
        .await?;

        inserted.push(QuestionResponse::from(question));
    }

    Ok(inserted)
}

fn normalize_whitelist(entries: &[String]) -> Vec<String> {
    entries.iter().map(|entry| entry.trim().to_string()).collect()
}

/// Empty group names are stored as NULL so they never match anyone.
fn normalize_group(group_name: Option<String>) -> Option<String> {
    group_name
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
}

/// Short random code, e.g. `9F2C41AB`.
fn generate_exam_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Lists the exams owned by the caller.
#[utoipa::path(
    get,
    path = "/api/exams",
    tag = "exams",
    security(("bearer" = [])),
    responses((status = 200, description = "Exams owned by the caller", body = [ExamSummary]))
)]
pub async fn list_exams(
    State(pool): State<PgPool>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let exams = sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(
        exams.into_iter().map(ExamSummary::from).collect::<Vec<_>>(),
    ))
}

/// Creates an exam.
///
/// * Instructors only.
/// * Requires an active subscription with room left in the plan's quota.
/// * Queues an invitation for each literal (non-wildcard) whitelist entry.
#[utoipa::path(
    post,
    path = "/api/exams",
    tag = "exams",
    security(("bearer" = [])),
    request_body = CreateExamRequest,
    responses(
        (status = 201, description = "Exam created", body = ExamResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not an instructor, no active subscription, or quota reached"),
        (status = 409, description = "Exam code already in use")
    )
)]
pub async fn create_exam(
    State(pool): State<PgPool>,
    State(notifier): State<Notifier>,
    user: CurrentUser,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !user.can_author_exams() {
        return Err(AppError::Forbidden(NOT_INSTRUCTOR.to_string()));
    }

    payload.validate()?;
    check_schedule(payload.start_date, payload.expiration_date)?;

    let exam_code = payload.exam_code.clone().unwrap_or_else(generate_exam_code);
    let whitelist = normalize_whitelist(&payload.whitelist);

    let mut tx = pool.begin().await?;

    let slot = quota::reserve_slot(&mut tx, user.id).await?;

    let exam = sqlx::query_as::<_, Exam>(&format!(
        r#"
        INSERT INTO exams
        (user_id, title, duration_minutes, exam_code, expiration_date, whitelist, start_date, group_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {EXAM_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(&payload.title)
    .bind(payload.duration)
    .bind(&exam_code)
    .bind(payload.expiration_date)
    .bind(SqlJson(&whitelist))
    .bind(payload.start_date)
    .bind(normalize_group(payload.group_name))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Exam code '{}' is already in use", exam_code))
        } else {
            tracing::error!("Failed to create exam: {:?}", e);
            AppError::from(e)
        }
    })?;

    let questions = insert_questions(&mut tx, exam.id, payload.questions).await?;
    quota::record_creation(&mut tx, slot).await?;
    tx.commit().await?;

    let invited = notifier.invite_whitelist(&exam);
    tracing::info!(
        exam_code = %exam.exam_code,
        owner = user.id,
        invited,
        "Exam created"
    );

    Ok((StatusCode::CREATED, Json(ExamResponse::new(exam, questions))))
}

/// Retrieves an exam by code.
///
/// Owners and group members get the full exam. Whitelisted users get it only
/// while the exam is running, with answer correctness masked.
#[utoipa::path(
    get,
    path = "/api/exams/{exam_code}",
    tag = "exams",
    security(("bearer" = [])),
    params(("exam_code" = String, Path, description = "The unique code of the exam")),
    responses(
        (status = 200, description = "Exam, possibly redacted", body = ExamResponse),
        (status = 403, description = "Not allowed, not started, or already over"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn get_exam(
    State(pool): State<PgPool>,
    user: CurrentUser,
    Path(exam_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let exam = fetch_exam_by_code(&pool, &exam_code).await?;
    let caller = fetch_user(&pool, user.id).await?;

    let viewer = Viewer {
        id: caller.id,
        email: &caller.email,
        category: caller.category.as_deref(),
    };

    let access = access::decide(&exam, &viewer, Utc::now()).inspect_err(|e| {
        tracing::debug!(exam_code = %exam.exam_code, user_id = caller.id, "Exam access denied: {}", e);
    })?;

    let mut questions = fetch_questions(&pool, exam.id).await?;
    if access == Access::Redacted {
        for question in &mut questions {
            question.body.redact();
        }
    }

    Ok(Json(ExamResponse::new(exam, questions)))
}

/// Replaces an exam's fields (and its questions, when given).
/// Owner only, and only before the exam starts.
#[utoipa::path(
    put,
    path = "/api/exams/{exam_code}",
    tag = "exams",
    security(("bearer" = [])),
    params(("exam_code" = String, Path, description = "The unique code of the exam")),
    request_body = UpdateExamRequest,
    responses(
        (status = 200, description = "Exam updated", body = ExamResponse),
        (status = 400, description = "Validation failed or exam already started"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn update_exam(
    State(pool): State<PgPool>,
    user: CurrentUser,
    Path(exam_code): Path<String>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam = fetch_exam_by_code(&pool, &exam_code).await?;
    access::ensure_owner(&exam, user.id)?;
    access::ensure_editable(&exam, Utc::now())?;

    payload.validate()?;
    check_schedule(payload.start_date, payload.expiration_date)?;

    let whitelist = normalize_whitelist(&payload.whitelist);

    let mut tx = pool.begin().await?;

    let updated = sqlx::query_as::<_, Exam>(&format!(
        r#"
        UPDATE exams
        SET title = $1, duration_minutes = $2, expiration_date = $3,
            whitelist = $4, start_date = $5, group_name = $6
        WHERE id = $7
        RETURNING {EXAM_COLUMNS}
        "#
    ))
    .bind(&payload.title)
    .bind(payload.duration)
    .bind(payload.expiration_date)
    .bind(SqlJson(&whitelist))
    .bind(payload.start_date)
    .bind(normalize_group(payload.group_name))
    .bind(exam.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update exam: {:?}", e);
        AppError::from(e)
    })?;

    if let Some(bodies) = payload.questions {
        sqlx::query("DELETE FROM questions WHERE exam_id = $1")
            .bind(exam.id)
            .execute(&mut *tx)
            .await?;
        insert_questions(&mut tx, exam.id, bodies).await?;
    }

    tx.commit().await?;

    let questions = fetch_questions(&pool, updated.id).await?;
    Ok(Json(ExamResponse::new(updated, questions)))
}

/// Updates only the given fields of an exam.
/// Owner only, and only before the exam starts.
#[utoipa::path(
    patch,
    path = "/api/exams/{exam_code}",
    tag = "exams",
    security(("bearer" = [])),
    params(("exam_code" = String, Path, description = "The unique code of the exam")),
    request_body = PatchExamRequest,
    responses(
        (status = 200, description = "Exam updated", body = ExamResponse),
        (status = 400, description = "Validation failed or exam already started"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn patch_exam(
    State(pool): State<PgPool>,
    user: CurrentUser,
    Path(exam_code): Path<String>,
    Json(payload): Json<PatchExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam = fetch_exam_by_code(&pool, &exam_code).await?;
    access::ensure_owner(&exam, user.id)?;
    access::ensure_editable(&exam, Utc::now())?;

    payload.validate()?;

    if payload.is_empty() {
        let questions = fetch_questions(&pool, exam.id).await?;
        return Ok(Json(ExamResponse::new(exam, questions)));
    }

    check_schedule(
        payload.start_date.unwrap_or(exam.start_date),
        payload.expiration_date.unwrap_or(exam.expiration_date),
    )?;

    let mut tx = pool.begin().await?;

    let has_field_updates = payload.title.is_some()
        || payload.duration.is_some()
        || payload.start_date.is_some()
        || payload.expiration_date.is_some()
        || payload.whitelist.is_some()
        || payload.group_name.is_some();

    if has_field_updates {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE exams SET ");
        let mut separated = builder.separated(", ");

        if let Some(title) = payload.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title);
        }

        if let Some(duration) = payload.duration {
            separated.push("duration_minutes = ");
            separated.push_bind_unseparated(duration);
        }

        if let Some(start_date) = payload.start_date {
            separated.push("start_date = ");
            separated.push_bind_unseparated(start_date);
        }

        if let Some(expiration_date) = payload.expiration_date {
            separated.push("expiration_date = ");
            separated.push_bind_unseparated(expiration_date);
        }

        if let Some(whitelist) = payload.whitelist {
            separated.push("whitelist = ");
            separated.push_bind_unseparated(SqlJson(normalize_whitelist(&whitelist)));
        }

        if let Some(group_name) = payload.group_name {
            separated.push("group_name = ");
            separated.push_bind_unseparated(normalize_group(Some(group_name)));
        }

        builder.push(" WHERE id = ");
        builder.push_bind(exam.id);

        builder.build().execute(&mut *tx).await.map_err(|e| {
            tracing::error!("Failed to patch exam: {:?}", e);
            AppError::from(e)
        })?;
    }

    if let Some(bodies) = payload.questions {
        sqlx::query("DELETE FROM questions WHERE exam_id = $1")
            .bind(exam.id)
            .execute(&mut *tx)
            .await?;
        insert_questions(&mut tx, exam.id, bodies).await?;
    }

    tx.commit().await?;

    let updated = fetch_exam_by_code(&pool, &exam.exam_code).await?;
    let questions = fetch_questions(&pool, updated.id).await?;
    Ok(Json(ExamResponse::new(updated, questions)))
}

/// Deletes an exam and its questions. Owner only.
#[utoipa::path(
    delete,
    path = "/api/exams/{exam_code}",
    tag = "exams",
    security(("bearer" = [])),
    params(("exam_code" = String, Path, description = "The unique code of the exam")),
    responses(
        (status = 204, description = "Exam deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn delete_exam(
    State(pool): State<PgPool>,
    user: CurrentUser,
    Path(exam_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let exam = fetch_exam_by_code(&pool, &exam_code).await?;
    access::ensure_owner(&exam, user.id)?;

    let result = sqlx::query("DELETE FROM exams WHERE id = $1")
        .bind(exam.id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete exam: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found.".to_string()));
    }

    tracing::info!(exam_code = %exam.exam_code, owner = user.id, "Exam deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Returns the exam id and duration. Visible to the owner, group members and
/// whitelisted users regardless of the exam window.
#[utoipa::path(
    get,
    path = "/api/exams/{exam_code}/duration",
    tag = "exams",
    security(("bearer" = [])),
    params(("exam_code" = String, Path, description = "The unique code of the exam")),
    responses(
        (status = 200, description = "Exam duration in minutes", body = ExamDurationResponse),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn get_exam_duration(
    State(pool): State<PgPool>,
    user: CurrentUser,
    Path(exam_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let exam = fetch_exam_by_code(&pool, &exam_code).await?;
    let caller = fetch_user(&pool, user.id).await?;

    access::ensure_participant(
        &exam,
        &Viewer {
            id: caller.id,
            email: &caller.email,
            category: caller.category.as_deref(),
        },
    )?;

    Ok(Json(ExamDurationResponse {
        exam_id: exam.id,
        duration: exam.duration_minutes,
    }))
}
