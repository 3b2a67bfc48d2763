// src/routes.rs

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    docs::ApiDoc,
    handlers::{admin, auth, exams, subscriptions},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: registration, login and the OpenAPI document.
/// * Authenticated: exams, subscriptions, plans.
/// * Admin: plan management (auth first, then the admin check).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(auth_layer.clone()),
        );

    let exam_routes = Router::new()
        .route("/", get(exams::list_exams).post(exams::create_exam))
        .route(
            "/{exam_code}",
            get(exams::get_exam)
                .put(exams::update_exam)
                .patch(exams::patch_exam)
                .delete(exams::delete_exam),
        )
        .route("/{exam_code}/duration", get(exams::get_exam_duration))
        .layer(auth_layer.clone());

    let subscription_routes = Router::new()
        .route("/", get(subscriptions::list_subscriptions))
        .route("/subscribe", post(subscriptions::subscribe))
        .route("/cancel", post(subscriptions::cancel))
        .route("/current", get(subscriptions::current))
        .layer(auth_layer.clone());

    let plan_routes = Router::new()
        .route("/", get(subscriptions::list_plans))
        .route("/{id}", get(subscriptions::get_plan))
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route("/plans", post(admin::create_plan))
        .route(
            "/plans/{id}",
            put(admin::update_plan).delete(admin::delete_plan),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/subscriptions", subscription_routes)
        .nest("/api/plans", plan_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
