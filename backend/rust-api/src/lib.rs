#![allow(dead_code)]

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS for the statistics endpoints, which teacher dashboards read
    // from the browser
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/exams", exam_routes(cors.clone()))
        .nest("/api/v1/attempts", attempt_routes())
        .nest("/api/v1/answers", answer_routes())
        .nest("/api/v1/students", student_routes(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn exam_routes(cors: CorsLayer) -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/{exam_id}/attempts",
            post(handlers::attempts::start_attempt),
        )
        .route(
            "/{exam_id}/statistics",
            get(handlers::statistics::exam_statistics).layer(cors),
        )
}

fn attempt_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/{attempt_id}/answers",
            post(handlers::attempts::submit_answer),
        )
        .route(
            "/{attempt_id}/complete",
            post(handlers::attempts::complete_attempt),
        )
        .route(
            "/{attempt_id}/abandon",
            post(handlers::attempts::abandon_attempt),
        )
        .route(
            "/{attempt_id}/results",
            get(handlers::attempts::attempt_results),
        )
}

fn answer_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route("/{answer_id}/grade", post(handlers::grading::grade_answer))
}

fn student_routes(cors: CorsLayer) -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route(
        "/{student_id}/statistics",
        get(handlers::statistics::student_statistics).layer(cors),
    )
}
