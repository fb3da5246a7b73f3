//! Application state.

use std::sync::Arc;

use billing_store::Store;

use crate::config::ServiceConfig;
use crate::gateway::{GatewayError, PaymentGateway, UnconfiguredGateway};
use crate::lifecycle::LifecycleEngine;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The lifecycle engine.
    pub engine: Arc<LifecycleEngine>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create application state around an existing engine.
    #[must_use]
    pub fn new(engine: Arc<LifecycleEngine>, config: ServiceConfig) -> Self {
        Self { engine, config }
    }

    /// Wire the store to the Stripe gateway described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe HTTP client cannot be built.
    pub fn from_config(store: Arc<dyn Store>, config: ServiceConfig) -> Result<Self, GatewayError> {
        let gateway: Arc<dyn PaymentGateway> = match &config.stripe_api_key {
            Some(key) => {
                tracing::info!(api_base = %config.stripe_api_base, "Stripe integration enabled");
                Arc::new(StripeClient::new(
                    key.clone(),
                    config.stripe_api_base.clone(),
                    config.gateway_timeout(),
                )?)
            }
            None => {
                tracing::warn!("Stripe not configured - payment operations will fail");
                Arc::new(UnconfiguredGateway)
            }
        };

        let engine = LifecycleEngine::new(store, gateway, config.engine_settings());
        Ok(Self::new(Arc::new(engine), config))
    }
}
