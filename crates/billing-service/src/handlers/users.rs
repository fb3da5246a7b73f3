//! User stub registration.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use billing_core::UserAccount;

use super::parse_owner;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Register/refresh user request.
#[derive(Debug, Deserialize)]
pub struct PutUserRequest {
    /// Email sent to the payment provider.
    pub email: String,
    /// Promo code captured at sign-up.
    #[serde(default)]
    pub promo_code: Option<String>,
}

/// Insert or refresh the user billing operates on.
pub async fn put_user(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(owner_id): Path<String>,
    Json(req): Json<PutUserRequest>,
) -> Result<Json<UserAccount>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    let user = state
        .engine
        .upsert_user(&owner, &req.email, req.promo_code)
        .await?;

    tracing::debug!(owner_id = %owner, service = %auth.service_name, "User registered");
    Ok(Json(user))
}
