//! Stripe implementation of the payment gateway.

mod client;
pub mod types;

pub use client::StripeClient;
