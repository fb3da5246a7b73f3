//! Liveness endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the process answers.
    pub status: &'static str,
    /// Crate name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// "stripe" or "unconfigured".
    pub payment_provider: &'static str,
    /// Whether the periodic renewal sweep runs in this process.
    pub sweep_enabled: bool,
}

/// Report liveness and which integrations are wired.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let payment_provider = if state.config.stripe_api_key.is_some() {
        "stripe"
    } else {
        "unconfigured"
    };

    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        payment_provider,
        sweep_enabled: state.config.sweep_interval_seconds > 0,
    })
}
