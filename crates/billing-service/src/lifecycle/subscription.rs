//! Trial start, paid conversion, plan-switch preview and cancellation.

use chrono::{Duration, Utc};
use serde::Serialize;

use billing_core::{
    price_for, trial_extension_months, trial_plan_id, validate_coupon_for_interval,
    BillingError, BillingInterval, BillingRecord, Plan, PlanTier, Result, UserAccount, UserId,
};

use super::{add_months, customer_id, LifecycleEngine};
use crate::gateway::{GatewayError, GatewayOperation};

/// What the user bought, for the confirmation message.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReceipt {
    /// Plan label ("Personal", "Growing Business", ...).
    pub plan: String,
    /// Billing interval.
    pub interval: BillingInterval,
    /// "a monthly" or "an annual".
    pub interval_phrase: String,
    /// Paid-through date, `YYYY-MM-DD`.
    pub expires_on: String,
    /// List price, e.g. `$18.99`.
    pub price: String,
    /// The record as persisted.
    pub record: BillingRecord,
}

impl LifecycleEngine {
    /// Start the free trial for `owner`.
    ///
    /// Creates the provider customer first; if that fails nothing is
    /// persisted. A recognised promo code on the user extends the trial.
    ///
    /// A record left unlinked by an earlier attempt that stopped after
    /// persisting it is linked and returned without calling the provider.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user is unknown.
    /// - `Forbidden` if the user already has a linked billing record.
    /// - `Gateway` if the provider customer cannot be created or comes back
    ///   without an id.
    pub async fn start_trial(&self, owner: &UserId, plan: Plan) -> Result<BillingRecord> {
        let _guard = self.locks.acquire(owner).await;

        let user = self.user(owner)?;
        match self.store.get_billing_by_owner(owner) {
            Ok(record) if user.billing_record_id.is_none() => {
                tracing::warn!(
                    owner_id = %owner,
                    billing_id = %record.id,
                    "Linking billing record left by an unfinished trial start"
                );
                return self.link_trial(user, record);
            }
            Ok(_) => {
                return Err(BillingError::forbidden(
                    "A trial has already been started for this account",
                ))
            }
            Err(billing_store::StoreError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let trial_plan = trial_plan_id(plan.provider_code());
        let customer = self
            .call(GatewayOperation::CreateCustomer, Some(owner), async {
                let customer = self
                    .gateway
                    .create_customer(&user.email, &trial_plan)
                    .await?;
                if customer.id.trim().is_empty() {
                    return Err(GatewayError::Decode(
                        "provider returned an empty customer id".to_string(),
                    ));
                }
                Ok(customer)
            })
            .await?;

        let expires = customer
            .trial_end
            .unwrap_or_else(|| Utc::now() + Duration::days(self.settings.trial_days));

        let mut draft = BillingRecord::new_trial(*owner, customer.id, expires);
        draft.plan = plan;
        let record = self.store.create_billing(draft)?;

        self.link_trial(user, record)
    }

    /// Point the user at its trial record, activate it and apply any promo
    /// extension. A failed extension keeps the base trial.
    fn link_trial(&self, mut user: UserAccount, record: BillingRecord) -> Result<BillingRecord> {
        let owner = user.id;
        user.billing_record_id = Some(record.id);
        user.is_active = true;
        self.store.put_user(&user)?;

        let mut record = record;
        if let Some(months) = user.promo_code.as_deref().and_then(trial_extension_months) {
            match self.extend_trial(&record, months) {
                Ok(extended) => {
                    tracing::info!(owner_id = %owner, months, "Trial extended by promo code");
                    record = extended;
                }
                Err(err) => tracing::warn!(
                    owner_id = %owner,
                    months,
                    error = %err,
                    "Promo trial extension failed, keeping base trial"
                ),
            }
        }

        tracing::info!(
            owner_id = %owner,
            billing_id = %record.id,
            expires = %record.expires,
            "Trial started"
        );
        Ok(record)
    }

    fn extend_trial(&self, record: &BillingRecord, months: u32) -> Result<BillingRecord> {
        let mut extended = record.clone();
        extended.expires = add_months(record.expires, months)?;
        Ok(self.store.update_billing(extended)?)
    }

    /// Move `owner` onto a paid subscription.
    ///
    /// Existing provider subscriptions are cancelled before the new one is
    /// created. If the second call fails the first is not undone.
    ///
    /// # Errors
    ///
    /// - `Validation` for a coupon that does not apply to `interval`; no
    ///   gateway call is made in that case.
    /// - `NotFound` if the owner has no billing record.
    /// - `Forbidden` if the record has no provider customer.
    /// - `Gateway` if either provider call fails.
    pub async fn convert_to_paid(
        &self,
        owner: &UserId,
        tier: PlanTier,
        interval: BillingInterval,
        coupon: Option<&str>,
    ) -> Result<ConversionReceipt> {
        let coupon = coupon
            .filter(|c| !c.trim().is_empty())
            .map(|c| validate_coupon_for_interval(c, interval))
            .transpose()?;

        let _guard = self.locks.acquire(owner).await;

        let mut user = self.user(owner)?;
        let mut record = self.store.get_billing_by_owner(owner)?;
        let customer = customer_id(&record)?;

        let cancelled = self
            .call(
                GatewayOperation::CancelSubscriptions,
                Some(owner),
                self.gateway.cancel_all_subscriptions(&customer),
            )
            .await?;

        let plan_id = tier.provider_plan_id(interval);
        let subscription = self
            .call(
                GatewayOperation::CreateSubscription,
                Some(owner),
                self.gateway
                    .create_subscription(&customer, &plan_id, coupon.as_deref()),
            )
            .await
            .map_err(|err| {
                if cancelled > 0 {
                    tracing::warn!(
                        owner_id = %owner,
                        cancelled,
                        "Previous subscriptions were cancelled but the new one was not created"
                    );
                }
                err
            })?;

        if record.is_cancel {
            tracing::info!(owner_id = %owner, "Conversion clears pending cancellation");
        }
        record.expires = subscription.period_end;
        record.plan = tier.into();
        record.interval = Some(interval);
        record.is_on_trial = false;
        record.is_cancel = false;
        let record = self.store.update_billing(record)?;

        user.is_active = true;
        self.store.put_user(&user)?;

        tracing::info!(
            owner_id = %owner,
            plan = tier.label(),
            interval = interval.as_str(),
            coupon = ?coupon,
            expires = %record.expires,
            "Subscription converted to paid"
        );

        Ok(ConversionReceipt {
            plan: tier.label().to_string(),
            interval,
            interval_phrase: interval.receipt_phrase().to_string(),
            expires_on: record.expires.format("%Y-%m-%d").to_string(),
            price: format!("${:.2}", price_for(tier, interval)),
            record,
        })
    }

    /// Cost in minor units of switching `owner` to `tier`/`interval` now.
    ///
    /// Sums the preview lines whose period starts exactly at the proration
    /// instant. Zero when the owner has no active subscription.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the owner has no billing record.
    /// - `Forbidden` if the record has no provider customer.
    /// - `Gateway` if the preview cannot be fetched.
    pub async fn preview_switch(
        &self,
        owner: &UserId,
        interval: BillingInterval,
        tier: PlanTier,
    ) -> Result<i64> {
        let record = self.store.get_billing_by_owner(owner)?;
        let customer = customer_id(&record)?;
        let at = Utc::now().timestamp();

        let preview = self
            .call(
                GatewayOperation::PreviewProration,
                Some(owner),
                self.gateway
                    .preview_proration(&customer, &tier.provider_plan_id(interval), at),
            )
            .await?;

        Ok(preview.map_or(0, |preview| {
            preview
                .lines
                .iter()
                .filter(|line| line.period_start == at)
                .map(|line| line.amount)
                .sum()
        }))
    }

    /// Cancel `owner`'s paid subscription. Access continues until `expires`;
    /// the sweep deactivates the user afterwards.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the owner has no billing record.
    /// - `Forbidden` while the record is on trial; nothing is changed.
    /// - `Gateway` if the provider call fails.
    pub async fn cancel(&self, owner: &UserId) -> Result<BillingRecord> {
        let _guard = self.locks.acquire(owner).await;

        let mut record = self.store.get_billing_by_owner(owner)?;
        if record.is_on_trial {
            return Err(BillingError::forbidden("Can not cancel a trial"));
        }
        let customer = customer_id(&record)?;

        let cancelled = self
            .call(
                GatewayOperation::CancelSubscriptions,
                Some(owner),
                self.gateway.cancel_all_subscriptions(&customer),
            )
            .await?;

        record.is_cancel = true;
        let record = self.store.update_billing(record)?;

        tracing::info!(
            owner_id = %owner,
            cancelled,
            expires = %record.expires,
            "Subscription cancelled"
        );
        Ok(record)
    }
}
