//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, billing, coupons, health, users};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for the billing, user and coupon endpoints.
/// Most of these wait on the payment provider.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Manual sweeps queue behind each other.
const SWEEP_MAX_CONCURRENT_REQUESTS: usize = 1;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Service API key (`x-api-key`)
/// - `PUT /v1/users/:owner_id` - Register or refresh a user
/// - `POST /v1/billing/:owner_id/trial` - Start the free trial
/// - `GET /v1/billing/:owner_id` - Billing record
/// - `GET /v1/billing/:owner_id/plan` - Plan summary
/// - `POST /v1/billing/:owner_id/subscription` - Convert to / switch paid plan
/// - `GET /v1/billing/:owner_id/subscription/preview` - Proration preview
/// - `DELETE /v1/billing/:owner_id/subscription` - Cancel
/// - `GET /v1/billing/:owner_id/cards` - Cards on file
/// - `POST /v1/billing/:owner_id/cards` - Attach a payment method
/// - `GET /v1/billing/:owner_id/balance` - Provider balance
/// - `GET /v1/billing/:owner_id/history` - Past charges
/// - `POST /v1/billing/:owner_id/feedback` - Post-trial feedback
/// - `POST /v1/coupons/check` - Check a coupon
/// - `POST /v1/admin/sweep[?run_id=]` - Run (or resume) the renewal sweep now
///
/// API routes share a concurrency limit; manual sweeps run one at a time.
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Users
        .route("/v1/users/:owner_id", put(users::put_user))
        // Billing
        .route("/v1/billing/:owner_id", get(billing::get_billing))
        .route("/v1/billing/:owner_id/trial", post(billing::start_trial))
        .route("/v1/billing/:owner_id/plan", get(billing::get_plan))
        .route(
            "/v1/billing/:owner_id/subscription",
            post(billing::subscribe).delete(billing::cancel),
        )
        .route(
            "/v1/billing/:owner_id/subscription/preview",
            get(billing::preview_switch),
        )
        .route(
            "/v1/billing/:owner_id/cards",
            get(billing::list_cards).post(billing::add_card),
        )
        .route("/v1/billing/:owner_id/balance", get(billing::get_balance))
        .route("/v1/billing/:owner_id/history", get(billing::get_history))
        .route(
            "/v1/billing/:owner_id/feedback",
            post(billing::record_feedback),
        )
        // Coupons
        .route("/v1/coupons/check", post(coupons::check_coupon))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    let admin_routes = Router::new()
        .route("/v1/admin/sweep", post(admin::run_sweep))
        .layer(ConcurrencyLimitLayer::new(SWEEP_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no limit)
        .route("/health", get(health::health))
        .merge(api_routes)
        .merge(admin_routes)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
