// src/services/quota.rs

//! Subscription-gated exam creation.

use sqlx::PgConnection;

use crate::{
    error::AppError,
    models::subscription::{SUBSCRIPTION_WITH_PLAN_COLUMNS, SubscriptionRow},
};

pub const NO_SUBSCRIPTION: &str =
    "You don't have an active subscription. Please subscribe to create exams.";
pub const LIMIT_REACHED: &str =
    "You have reached the exam limit for your subscription plan. Please upgrade to create more exams.";

/// Pure quota rule: an active subscription is required, and a nonzero plan
/// limit caps the number of exams the user may own.
pub fn check_quota(exam_limit: Option<i32>, exams_owned: i64) -> Result<(), AppError> {
    let limit = exam_limit.ok_or_else(|| AppError::Forbidden(NO_SUBSCRIPTION.to_string()))?;

    if limit != 0 && exams_owned >= i64::from(limit) {
        return Err(AppError::Forbidden(LIMIT_REACHED.to_string()));
    }

    Ok(())
}

/// A granted creation slot. Must be recorded in the same transaction as the insert.
#[derive(Debug, Clone, Copy)]
pub struct QuotaSlot {
    pub subscription_id: i64,
    pub exams_owned: i64,
}

/// Locks the caller's active subscription row, counts their exams and applies `check_quota`.
pub async fn reserve_slot(conn: &mut PgConnection, user_id: i64) -> Result<QuotaSlot, AppError> {
    let subscription = sqlx::query_as::<_, SubscriptionRow>(&format!(
        r#"
        SELECT {SUBSCRIPTION_WITH_PLAN_COLUMNS}
        FROM subscriptions s
        JOIN subscription_plans p ON p.id = s.plan_id
        WHERE s.user_id = $1 AND s.is_active = TRUE
        FOR UPDATE OF s
        "#
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let exams_owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exams WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    check_quota(subscription.as_ref().map(|s| s.exam_limit), exams_owned)?;

    let subscription_id = subscription
        .map(|s| s.id)
        .ok_or_else(|| AppError::Forbidden(NO_SUBSCRIPTION.to_string()))?;

    Ok(QuotaSlot {
        subscription_id,
        exams_owned,
    })
}

/// Bumps the subscription counter after a successful insert.
pub async fn record_creation(conn: &mut PgConnection, slot: QuotaSlot) -> Result<(), AppError> {
    let exams_created = i32::try_from(slot.exams_owned + 1)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    sqlx::query("UPDATE subscriptions SET exams_created = $1 WHERE id = $2")
        .bind(exams_created)
        .bind(slot.subscription_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
