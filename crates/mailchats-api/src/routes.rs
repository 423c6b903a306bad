//! API routes

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{require_auth, AppState};
use crate::handlers::{
    ai, auth, campaigns, email, email_statuses, health, personalization, theme, ws,
};

/// Four 10MB uploads per send form
const UPLOAD_LIMIT: usize = 4 * 10 * 1024 * 1024;

/// Log `METHOD path status in Xms` for API calls
async fn log_requests(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if !path.starts_with("/api") {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let start = Instant::now();
    let response = next.run(request).await;
    info!(
        "{} {} {} in {}ms",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let state = Arc::new(state);

    // Health check routes
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness));

    // Session routes
    let session_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::current));

    // License and verification code routes
    let auth_routes = Router::new()
        .route("/license", post(auth::license))
        .route("/send-verification-code", post(auth::send_verification_code))
        .route("/verify-code", post(auth::verify_code));

    // Campaign sending, personalization and subject generation
    let email_routes = Router::new()
        .route("/test", post(email::test_email))
        .route("/enhanced-test", post(email::enhanced_test_email))
        .route("/send", post(email::send_campaign))
        .route("/campaigns", get(email::list_campaigns))
        .route("/campaigns/:id", get(email::get_campaign))
        .route("/campaigns/:id/stats", get(email::campaign_stats))
        .route(
            "/personalization-variables",
            get(personalization::variables),
        )
        .route(
            "/personalization-documentation",
            get(personalization::documentation),
        )
        .route("/parse-recipient", post(personalization::parse_recipient))
        .route("/apply-enhanced-merge", post(personalization::apply_merge))
        .route("/generate-subjects", post(ai::generate_subjects))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT));

    // Template recommendation routes
    let template_routes = Router::new()
        .route("/analyze", post(ai::analyze_template))
        .route("/suggestions", post(ai::template_suggestions));

    // Campaign and email status CRUD (session required)
    let crud_routes = Router::new()
        .route(
            "/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route(
            "/campaigns/:id",
            get(campaigns::get_campaign)
                .patch(campaigns::update_campaign)
                .delete(campaigns::delete_campaign),
        )
        .route(
            "/campaigns/:id/emails",
            get(email_statuses::list_email_statuses).post(email_statuses::create_email_status),
        )
        .route(
            "/emails/:id",
            get(email_statuses::get_email_status)
                .patch(email_statuses::update_email_status)
                .delete(email_statuses::delete_email_status),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(session_routes)
        .nest("/auth", auth_routes)
        .nest("/email", email_routes)
        .nest("/template", template_routes)
        .route("/theme", get(theme::get_theme).post(theme::update_theme))
        .merge(crud_routes);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api", api)
        .route("/ws", get(ws::upgrade))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
