//! Read-mostly account operations: plan details, cards, balance, history,
//! coupon checks and trial feedback.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use billing_core::{
    validate_coupon_for_interval, BillingError, BillingInterval, BillingRecord, LifecycleState,
    Plan, Result, UserId,
};

use super::{customer_id, LifecycleEngine};
use crate::gateway::{Card, GatewayOperation};

const INVALID_COUPON: &str = "Your coupon was invalid or has expired";

/// What the account page shows about the current plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    /// Current plan.
    pub plan: Plan,
    /// Plan label.
    pub plan_name: String,
    /// Billing interval of a paid plan.
    pub interval: Option<BillingInterval>,
    /// Lifecycle state right now.
    pub state: LifecycleState,
    /// On trial.
    pub is_on_trial: bool,
    /// Cancellation requested.
    pub is_cancel: bool,
    /// Expiry instant.
    pub expires: DateTime<Utc>,
    /// Last day of access, `YYYY-MM-DD`.
    pub access_until: String,
    /// Whether the user currently has access.
    pub user_active: bool,
    /// Number of cards on file.
    pub cards_on_file: usize,
}

/// One past charge, in display units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingHistoryEntry {
    /// Amount in dollars.
    pub amount: f64,
    /// Charge date, `YYYY-MM-DD`.
    pub date: String,
    /// Whether the charge succeeded.
    pub paid: bool,
}

impl LifecycleEngine {
    /// Summary of `owner`'s plan.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user or the billing record is missing.
    pub fn plan_details(&self, owner: &UserId) -> Result<PlanSummary> {
        let user = self.user(owner)?;
        let record = self.store.get_billing_by_owner(owner)?;
        let now = Utc::now();

        Ok(PlanSummary {
            plan: record.plan,
            plan_name: record.plan.label().to_string(),
            interval: record.interval,
            state: record.state(now),
            is_on_trial: record.is_on_trial,
            is_cancel: record.is_cancel,
            expires: record.expires,
            access_until: (record.expires - Duration::days(1))
                .format("%Y-%m-%d")
                .to_string(),
            user_active: user.is_active,
            cards_on_file: record.cards_on_file.len(),
        })
    }

    /// Percentage a coupon takes off, after checking it applies to `interval`.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty or interval-restricted code, or one the
    ///   provider reports as not valid or not live.
    /// - `Gateway` if the provider lookup fails.
    pub async fn check_coupon(&self, code: &str, interval: BillingInterval) -> Result<f64> {
        let code = validate_coupon_for_interval(code, interval)?;

        let coupon = self
            .call(
                GatewayOperation::LookupCoupon,
                None,
                self.gateway.lookup_coupon(&code),
            )
            .await?;

        if !(coupon.valid && coupon.live) {
            tracing::debug!(code = %code, valid = coupon.valid, live = coupon.live, "Coupon rejected");
            return Err(BillingError::validation(INVALID_COUPON));
        }

        Ok(coupon.percent_off.unwrap_or(0.0))
    }

    /// Cards on file at the provider.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` without a provider customer, or `Gateway`.
    pub async fn cards(&self, owner: &UserId) -> Result<Vec<Card>> {
        let record = self.store.get_billing_by_owner(owner)?;
        let customer = customer_id(&record)?;

        self.call(
            GatewayOperation::ListCards,
            Some(owner),
            self.gateway.list_cards(&customer),
        )
        .await
    }

    /// Attach a tokenised payment method, make it the default and refresh
    /// `cards_on_file`.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty token, `NotFound`, `Forbidden` without a
    /// provider customer, or `Gateway`.
    pub async fn add_payment_method(&self, owner: &UserId, token: &str) -> Result<BillingRecord> {
        let token = token.trim();
        if token.is_empty() {
            return Err(BillingError::validation("Missing payment token"));
        }

        let _guard = self.locks.acquire(owner).await;
        let mut record = self.store.get_billing_by_owner(owner)?;
        let customer = customer_id(&record)?;

        self.call(
            GatewayOperation::AttachPaymentMethod,
            Some(owner),
            self.gateway.attach_payment_method(&customer, token),
        )
        .await?;

        let cards = self
            .call(
                GatewayOperation::ListCards,
                Some(owner),
                self.gateway.list_cards(&customer),
            )
            .await?;

        record.cards_on_file = cards.into_iter().map(|card| card.id).collect();
        let record = self.store.update_billing(record)?;

        tracing::info!(owner_id = %owner, cards = record.cards_on_file.len(), "Payment method added");
        Ok(record)
    }

    /// Customer balance in minor units.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` without a provider customer, or `Gateway`.
    pub async fn balance(&self, owner: &UserId) -> Result<i64> {
        let record = self.store.get_billing_by_owner(owner)?;
        let customer = customer_id(&record)?;

        self.call(
            GatewayOperation::GetBalance,
            Some(owner),
            self.gateway.get_balance(&customer),
        )
        .await
    }

    /// Past charges in dollars, in provider order.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` without a provider customer, or `Gateway`.
    pub async fn billing_history(&self, owner: &UserId) -> Result<Vec<BillingHistoryEntry>> {
        let record = self.store.get_billing_by_owner(owner)?;
        let customer = customer_id(&record)?;

        let charges = self
            .call(
                GatewayOperation::ListCharges,
                Some(owner),
                self.gateway.list_charges(&customer),
            )
            .await?;

        Ok(charges
            .into_iter()
            .map(|charge| {
                #[allow(clippy::cast_precision_loss)]
                let amount = charge.amount as f64 / 100.0;
                BillingHistoryEntry {
                    amount,
                    date: charge.created_at.format("%Y-%m-%d").to_string(),
                    paid: charge.paid,
                }
            })
            .collect())
    }

    /// Store why the user did not buy after the trial. Recorded once.
    ///
    /// # Errors
    ///
    /// - `Validation` if both fields are empty.
    /// - `NotFound` if the user or the billing record is missing.
    /// - `Forbidden` if feedback was already recorded.
    pub async fn record_trial_feedback(
        &self,
        owner: &UserId,
        reason: Option<String>,
        feedback: Option<String>,
    ) -> Result<BillingRecord> {
        let clean = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let (reason, feedback) = (clean(reason), clean(feedback));
        if reason.is_none() && feedback.is_none() {
            return Err(BillingError::validation("Please tell us why"));
        }

        let _guard = self.locks.acquire(owner).await;
        let mut user = self.user(owner)?;
        let mut record = self.store.get_billing_by_owner(owner)?;

        if user.trial_feedback
            || record.reason_not_purchase.is_some()
            || record.feedback_after_trial.is_some()
        {
            return Err(BillingError::forbidden("Trial feedback was already recorded"));
        }

        record.reason_not_purchase = reason;
        record.feedback_after_trial = feedback;
        let record = self.store.update_billing(record)?;

        user.trial_feedback = true;
        self.store.put_user(&user)?;

        tracing::info!(owner_id = %owner, "Trial feedback recorded");
        Ok(record)
    }
}
