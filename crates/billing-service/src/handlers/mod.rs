//! API handlers.

pub mod admin;
pub mod billing;
pub mod coupons;
pub mod health;
pub mod users;

use billing_core::UserId;

use crate::error::ApiError;

/// Parse the `:owner_id` path segment.
fn parse_owner(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid owner id: {raw}")))
}
