//! Coupon checks.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use billing_core::{normalize_coupon, BillingInterval};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Coupon check request.
#[derive(Debug, Deserialize)]
pub struct CheckCouponRequest {
    /// Coupon code, any case.
    pub code: String,
    /// "monthly" or "annually".
    pub duration: String,
}

/// Coupon check response.
#[derive(Debug, Serialize)]
pub struct CheckCouponResponse {
    /// Normalised code.
    pub code: String,
    /// Percentage off.
    pub percent_off: f64,
}

/// Check a coupon against the provider.
pub async fn check_coupon(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(req): Json<CheckCouponRequest>,
) -> Result<Json<CheckCouponResponse>, ApiError> {
    let interval: BillingInterval = req.duration.parse()?;
    let percent_off = state.engine.check_coupon(&req.code, interval).await?;

    Ok(Json(CheckCouponResponse {
        code: normalize_coupon(&req.code),
        percent_off,
    }))
}
