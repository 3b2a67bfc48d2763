// src/handlers/subscriptions.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::subscription::{
        SUBSCRIPTION_WITH_PLAN_COLUMNS, SubscribeRequest, SubscriptionPlan, SubscriptionResponse,
        SubscriptionRow,
    },
    utils::jwt::CurrentUser,
};

async fn fetch_active_subscription(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<SubscriptionRow>, AppError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        r#"
        SELECT {SUBSCRIPTION_WITH_PLAN_COLUMNS}
        FROM subscriptions s
        JOIN subscription_plans p ON p.id = s.plan_id
        WHERE s.user_id = $1 AND s.is_active = TRUE
        "#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn fetch_plan(pool: &PgPool, id: i64) -> Result<SubscriptionPlan, AppError> {
    sqlx::query_as::<_, SubscriptionPlan>(
        "SELECT id, name, exam_limit, price_cents FROM subscription_plans WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Subscription plan not found".to_string()))
}

/// Lists the caller's subscriptions (at most one, active or not).
#[utoipa::path(
    get,
    path = "/api/subscriptions",
    tag = "subscriptions",
    security(("bearer" = [])),
    responses((status = 200, description = "Caller's subscriptions", body = [SubscriptionResponse]))
)]
pub async fn list_subscriptions(
    State(pool): State<PgPool>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
        r#"
        SELECT {SUBSCRIPTION_WITH_PLAN_COLUMNS}
        FROM subscriptions s
        JOIN subscription_plans p ON p.id = s.plan_id
        WHERE s.user_id = $1
        ORDER BY s.start_date DESC
        "#
    ))
    .bind(user.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(SubscriptionResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Subscribes the caller to a plan.
///
/// * Same plan as the active subscription: nothing changes (200).
/// * Different plan: the subscription is switched in place (200).
/// * No active subscription: a new one starts (201).
#[utoipa::path(
    post,
    path = "/api/subscriptions/subscribe",
    tag = "subscriptions",
    security(("bearer" = [])),
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscription started", body = SubscriptionResponse),
        (status = 200, description = "Plan switched or already subscribed"),
        (status = 404, description = "Plan not found")
    )
)]
pub async fn subscribe(
    State(pool): State<PgPool>,
    user: CurrentUser,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let plan = fetch_plan(&pool, payload.plan_id).await?;

    let current = fetch_active_subscription(&pool, user.id).await?;

    if let Some(current) = &current {
        if current.plan_id == plan.id {
            return Ok((
                StatusCode::OK,
                Json(json!({ "message": "You are already subscribed to this plan" })),
            ));
        }
    }

    // One row per user: reactivate or switch it in place.
    sqlx::query(
        r#"
        INSERT INTO subscriptions (user_id, plan_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET
            plan_id = EXCLUDED.plan_id,
            is_active = TRUE,
            start_date = CURRENT_TIMESTAMP,
            end_date = NULL
        "#,
    )
    .bind(user.id)
    .bind(plan.id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to subscribe: {:?}", e);
        AppError::from(e)
    })?;

    let subscription = fetch_active_subscription(&pool, user.id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Subscription vanished after upsert".to_string()))?;

    let status = if current.is_some() {
        tracing::info!(user_id = user.id, plan = %plan.name, "Subscription switched");
        StatusCode::OK
    } else {
        tracing::info!(user_id = user.id, plan = %plan.name, "Subscription started");
        StatusCode::CREATED
    };

    Ok((status, Json(json!(SubscriptionResponse::from(subscription)))))
}

/// Cancels the caller's active subscription.
#[utoipa::path(
    post,
    path = "/api/subscriptions/cancel",
    tag = "subscriptions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Subscription cancelled"),
        (status = 404, description = "No active subscription found")
    )
)]
pub async fn cancel(
    State(pool): State<PgPool>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET is_active = FALSE, end_date = CURRENT_TIMESTAMP
        WHERE user_id = $1 AND is_active = TRUE
        "#,
    )
    .bind(user.id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No active subscription found".to_string()));
    }

    tracing::info!(user_id = user.id, "Subscription cancelled");

    Ok(Json(json!({ "status": "Subscription cancelled" })))
}

/// Returns the caller's active subscription.
#[utoipa::path(
    get,
    path = "/api/subscriptions/current",
    tag = "subscriptions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Active subscription", body = SubscriptionResponse),
        (status = 404, description = "No subscription found")
    )
)]
pub async fn current(
    State(pool): State<PgPool>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let subscription = fetch_active_subscription(&pool, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No subscription found".to_string()))?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// Lists all subscription plans.
#[utoipa::path(
    get,
    path = "/api/plans",
    tag = "plans",
    security(("bearer" = [])),
    responses((status = 200, description = "Available plans", body = [SubscriptionPlan]))
)]
pub async fn list_plans(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let plans = sqlx::query_as::<_, SubscriptionPlan>(
        "SELECT id, name, exam_limit, price_cents FROM subscription_plans ORDER BY price_cents, id",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(plans))
}

/// Retrieves a single plan by ID.
#[utoipa::path(
    get,
    path = "/api/plans/{id}",
    tag = "plans",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Plan id")),
    responses(
        (status = 200, description = "Plan", body = SubscriptionPlan),
        (status = 404, description = "Plan not found")
    )
)]
pub async fn get_plan(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_plan(&pool, id).await?))
}
