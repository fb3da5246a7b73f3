//! Core types and utilities for the billing service.
//!
//! This crate provides the foundational types shared by the store and the service:
//!
//! - **Identifiers**: `UserId`, `BillingRecordId`, `SweepRunId`
//! - **Records**: `BillingRecord`, `UserAccount`, `Plan`, `LifecycleState`
//! - **Catalog**: `PlanTier`, `BillingInterval`, `price_for`, `round_to_cents`
//! - **Coupons**: interval restrictions and trial-extension promo codes
//!
//! # Money
//!
//! Catalog prices are expressed in dollars as `f64` and always pass through
//! [`round_to_cents`] (round half away from zero). Provider amounts (balances,
//! charges, proration deltas) stay in integer minor units.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod billing;
pub mod catalog;
pub mod coupon;
pub mod error;
pub mod ids;
pub mod user;

pub use billing::{BillingRecord, LifecycleState, Plan};
pub use catalog::{
    price_for, price_for_label, round_to_cents, trial_plan_id, BillingInterval,
    PlanTier,
};
pub use coupon::{
    normalize_coupon, trial_extension_months, validate_coupon_for_interval,
    TRIAL_EXTENSION_MONTHS,
};
pub use error::{BillingError, Result};
pub use ids::{BillingRecordId, IdError, SweepRunId, UserId};
pub use user::UserAccount;
