// src/docs.rs

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    handlers::{admin, auth, exams, subscriptions},
    models::{
        exam::{
            CreateExamRequest, ExamDurationResponse, ExamResponse, ExamSummary, PatchExamRequest,
            UpdateExamRequest,
        },
        question::{Choice, QuestionBody, QuestionKind, QuestionResponse, TestCase},
        subscription::{
            CreatePlanRequest, SubscribeRequest, SubscriptionPlan, SubscriptionResponse,
            UpdatePlanRequest,
        },
        user::{CreateUserRequest, LoginRequest, TokenResponse, User},
    },
};

/// OpenAPI document for every public route.
#[derive(OpenApi)]
#[openapi(
    info(title = "Exam Manager API"),
    paths(
        auth::register,
        auth::login,
        auth::me,
        exams::list_exams,
        exams::create_exam,
        exams::get_exam,
        exams::update_exam,
        exams::patch_exam,
        exams::delete_exam,
        exams::get_exam_duration,
        subscriptions::list_subscriptions,
        subscriptions::subscribe,
        subscriptions::cancel,
        subscriptions::current,
        subscriptions::list_plans,
        subscriptions::get_plan,
        admin::create_plan,
        admin::update_plan,
        admin::delete_plan,
    ),
    components(schemas(
        User,
        CreateUserRequest,
        LoginRequest,
        TokenResponse,
        ExamResponse,
        ExamSummary,
        ExamDurationResponse,
        CreateExamRequest,
        UpdateExamRequest,
        PatchExamRequest,
        QuestionBody,
        QuestionKind,
        QuestionResponse,
        Choice,
        TestCase,
        SubscriptionPlan,
        SubscriptionResponse,
        SubscribeRequest,
        CreatePlanRequest,
        UpdatePlanRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "exams", description = "Exam authoring and retrieval"),
        (name = "subscriptions", description = "Plan subscriptions"),
        (name = "plans", description = "Subscription plans"),
        (name = "admin", description = "Plan administration")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
