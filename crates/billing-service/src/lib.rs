//! Billing HTTP API service.
//!
//! This crate provides the subscription lifecycle engine and the HTTP API in
//! front of it:
//!
//! - Trial start, conversion to a paid plan, cancellation
//! - Plan-switch proration previews and coupon checks
//! - Cards, balance and charge history from the payment provider
//! - The periodic renewal/expiry sweep
//!
//! # Authentication
//!
//! Every `/v1` route requires the service API key in `x-api-key`; callers are
//! other backend services, never browsers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)]

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod lifecycle;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use gateway::{GatewayError, GatewayOperation, PaymentGateway};
pub use lifecycle::{EngineSettings, LifecycleEngine, SweepReport};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::StripeClient;
