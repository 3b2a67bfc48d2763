// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    models::subscription::{CreatePlanRequest, SubscriptionPlan, UpdatePlanRequest},
};

fn map_plan_write_error(e: sqlx::Error, name: Option<&str>) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict(format!(
            "A plan named '{}' already exists",
            name.unwrap_or_default()
        ))
    } else {
        tracing::error!("Failed to write subscription plan: {:?}", e);
        AppError::from(e)
    }
}

/// Creates a subscription plan.
/// Admin only.
#[utoipa::path(
    post,
    path = "/api/admin/plans",
    tag = "admin",
    security(("bearer" = [])),
    request_body = CreatePlanRequest,
    responses(
        (status = 201, description = "Plan created", body = SubscriptionPlan),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Duplicate plan name")
    )
)]
pub async fn create_plan(
    State(pool): State<PgPool>,
    Json(payload): Json<CreatePlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let plan = sqlx::query_as::<_, SubscriptionPlan>(
        r#"
        INSERT INTO subscription_plans (name, exam_limit, price_cents)
        VALUES ($1, $2, $3)
        RETURNING id, name, exam_limit, price_cents
        "#,
    )
    .bind(&payload.name)
    .bind(payload.exam_limit)
    .bind(payload.price_cents)
    .fetch_one(&pool)
    .await
    .map_err(|e| map_plan_write_error(e, Some(&payload.name)))?;

    tracing::info!(plan_id = plan.id, name = %plan.name, "Subscription plan created");

    Ok((StatusCode::CREATED, Json(plan)))
}

/// Updates a subscription plan by ID. Fields are optional.
/// Admin only.
#[utoipa::path(
    put,
    path = "/api/admin/plans/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Plan id")),
    request_body = UpdatePlanRequest,
    responses(
        (status = 200, description = "Plan updated", body = SubscriptionPlan),
        (status = 404, description = "Plan not found"),
        (status = 409, description = "Duplicate plan name")
    )
)]
pub async fn update_plan(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.name.is_none() && payload.exam_limit.is_none() && payload.price_cents.is_none() {
        let plan = crate::handlers::subscriptions::fetch_plan(&pool, id).await?;
        return Ok(Json(plan));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE subscription_plans SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = &payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.clone());
    }

    if let Some(exam_limit) = payload.exam_limit {
        separated.push("exam_limit = ");
        separated.push_bind_unseparated(exam_limit);
    }

    if let Some(price_cents) = payload.price_cents {
        separated.push("price_cents = ");
        separated.push_bind_unseparated(price_cents);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING id, name, exam_limit, price_cents");

    let plan = builder
        .build_query_as::<SubscriptionPlan>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| map_plan_write_error(e, payload.name.as_deref()))?
        .ok_or_else(|| AppError::NotFound("Subscription plan not found".to_string()))?;

    Ok(Json(plan))
}

/// Deletes a subscription plan by ID.
/// Admin only. Plans referenced by a subscription cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/admin/plans/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Plan id")),
    responses(
        (status = 204, description = "Plan deleted"),
        (status = 404, description = "Plan not found"),
        (status = 409, description = "Plan still has subscribers")
    )
)]
pub async fn delete_plan(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM subscription_plans WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::Conflict("Plan is referenced by existing subscriptions".to_string())
            } else {
                tracing::error!("Failed to delete subscription plan: {:?}", e);
                AppError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Subscription plan not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
