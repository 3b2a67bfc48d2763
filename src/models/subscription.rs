// src/models/subscription.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Represents the 'subscription_plans' table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionPlan {
    pub id: i64,
    pub name: String,
    /// Maximum number of exams a subscriber may own. 0 means unlimited.
    pub exam_limit: i32,
    pub price_cents: i64,
}

/// Columns selected when a subscription is loaded together with its plan.
pub const SUBSCRIPTION_WITH_PLAN_COLUMNS: &str = "s.id, s.user_id, s.plan_id, s.start_date, \
     s.end_date, s.is_active, s.exams_created, p.name AS plan_name, p.exam_limit, p.price_cents";

/// Row of `subscriptions JOIN subscription_plans`.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub exams_created: i32,
    pub plan_name: String,
    pub exam_limit: i32,
    pub price_cents: i64,
}

impl SubscriptionRow {
    pub fn plan(&self) -> SubscriptionPlan {
        SubscriptionPlan {
            id: self.plan_id,
            name: self.plan_name.clone(),
            exam_limit: self.exam_limit,
            price_cents: self.price_cents,
        }
    }
}

/// Subscription with its plan nested, as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub id: i64,
    pub user: i64,
    pub plan: SubscriptionPlan,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub exams_created: i32,
}

impl From<SubscriptionRow> for SubscriptionResponse {
    fn from(row: SubscriptionRow) -> Self {
        let plan = row.plan();
        Self {
            id: row.id,
            user: row.user_id,
            plan,
            start_date: row.start_date,
            end_date: row.end_date,
            is_active: row.is_active,
            exams_created: row.exams_created,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub plan_id: i64,
}

/// DTO for admins creating a plan.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 0))]
    pub exam_limit: i32,
    #[validate(range(min = 0, max = 99_999_999))]
    pub price_cents: i64,
}

/// DTO for admins updating a plan. Fields are optional.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 0))]
    pub exam_limit: Option<i32>,
    #[validate(range(min = 0, max = 99_999_999))]
    pub price_cents: Option<i64>,
}
