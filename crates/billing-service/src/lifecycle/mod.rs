//! Subscription lifecycle engine.
//!
//! [`LifecycleEngine`] owns every state transition of a billing record:
//!
//! - no record → trial (`start_trial`)
//! - trial or paid or cancelling → paid (`convert_to_paid`)
//! - paid → cancelling (`cancel`)
//! - expired trial or cancelling → user deactivated (`sweep`)
//! - expired paid → paid for one more month (`sweep`)
//!
//! Mutating operations take a per-owner lock for their whole duration, and
//! the store's version check catches writers in other processes. Every call
//! to the payment gateway is bounded by [`EngineSettings::gateway_timeout`].

mod account;
mod locks;
mod subscription;
mod sweep;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Months, Utc};

use billing_core::{BillingError, BillingRecord, Result, UserAccount, UserId};
use billing_store::Store;

use crate::gateway::{GatewayError, GatewayOperation, PaymentGateway};

pub use account::{BillingHistoryEntry, PlanSummary};
pub use locks::OwnerLocks;
pub use subscription::ConversionReceipt;
pub use sweep::{next_run_id, run_periodic, SweepFailure, SweepOutcome, SweepReport};

/// Tunables for the lifecycle engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound on any single gateway call.
    pub gateway_timeout: Duration,
    /// Trial length used when the provider does not report a trial end.
    pub trial_days: i64,
    /// How many owners the sweep reconciles at once.
    pub sweep_concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(15),
            trial_days: 7,
            sweep_concurrency: 8,
        }
    }
}

/// Drives trials, conversions, cancellations and the renewal sweep.
pub struct LifecycleEngine {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    settings: EngineSettings,
    locks: OwnerLocks,
}

impl LifecycleEngine {
    /// Create an engine over the given store and gateway.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
            locks: OwnerLocks::default(),
        }
    }

    /// The engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Insert or refresh the user stub billing operates on.
    ///
    /// Billing-owned fields (activation, record link, feedback flag) are kept
    /// when the user already exists.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty email, or a storage error.
    pub async fn upsert_user(
        &self,
        owner: &UserId,
        email: &str,
        promo_code: Option<String>,
    ) -> Result<UserAccount> {
        let email = email.trim();
        if email.is_empty() {
            return Err(BillingError::validation("Email is required"));
        }

        let _guard = self.locks.acquire(owner).await;
        let user = match self.store.get_user(owner) {
            Ok(mut existing) => {
                email.clone_into(&mut existing.email);
                existing.promo_code = promo_code;
                existing
            }
            Err(billing_store::StoreError::NotFound { .. }) => {
                let mut user = UserAccount::new(*owner, email);
                user.promo_code = promo_code;
                user
            }
            Err(e) => return Err(e.into()),
        };

        self.store.put_user(&user)?;
        Ok(user)
    }

    /// The owner's billing record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the owner has no billing record.
    pub fn billing(&self, owner: &UserId) -> Result<BillingRecord> {
        Ok(self.store.get_billing_by_owner(owner)?)
    }

    fn user(&self, owner: &UserId) -> Result<UserAccount> {
        Ok(self.store.get_user(owner)?)
    }

    /// Run one gateway call under the configured timeout and map its error
    /// to the user-facing message.
    async fn call<T, F>(
        &self,
        operation: GatewayOperation,
        owner: Option<&UserId>,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, GatewayError>> + Send,
    {
        let timeout = self.settings.gateway_timeout;
        let result = tokio::time::timeout(timeout, fut)
            .await
            .unwrap_or(Err(GatewayError::Timeout(timeout)));

        result.map_err(|err| {
            tracing::error!(
                operation = operation.as_str(),
                owner_id = ?owner,
                error = %err,
                "Payment gateway call failed"
            );
            BillingError::gateway(operation.as_str(), err.user_message(operation))
        })
    }
}

/// Require a provider customer on the record.
fn customer_id(record: &BillingRecord) -> Result<String> {
    record.customer_id().map(str::to_string).ok_or_else(|| {
        BillingError::forbidden("This account has no payment provider customer yet")
    })
}

/// Add calendar months, clamping to the end of shorter months.
fn add_months(at: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    at.checked_add_months(Months::new(months))
        .ok_or_else(|| BillingError::Storage(format!("expiry out of range: {at} + {months} months")))
}
