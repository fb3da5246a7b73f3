//! Billing record types.
//!
//! A `BillingRecord` holds the trial/subscription state for exactly one user.
//! Records are never hard-deleted; they stay around for billing history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{BillingInterval, PlanTier};
use crate::ids::{BillingRecordId, SweepRunId, UserId};

/// The plan a billing record is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Free tier; used for trials.
    Free,
    /// Personal plan.
    Personal,
    /// Consultant plan.
    Consultant,
    /// Business plan.
    Business,
    /// Growing Business plan.
    GrowingBusiness,
}

impl Plan {
    /// The paid tier, or `None` for the free plan.
    #[must_use]
    pub const fn tier(self) -> Option<PlanTier> {
        match self {
            Self::Free => None,
            Self::Personal => Some(PlanTier::Personal),
            Self::Consultant => Some(PlanTier::Consultant),
            Self::Business => Some(PlanTier::Business),
            Self::GrowingBusiness => Some(PlanTier::GrowingBusiness),
        }
    }

    /// Human-readable plan name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.tier() {
            Some(tier) => tier.label(),
            None => "Free",
        }
    }

    /// Plan code registered with the payment provider.
    #[must_use]
    pub const fn provider_code(self) -> &'static str {
        match self.tier() {
            Some(tier) => tier.provider_code(),
            None => "free",
        }
    }
}

impl From<PlanTier> for Plan {
    fn from(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Personal => Self::Personal,
            PlanTier::Consultant => Self::Consultant,
            PlanTier::Business => Self::Business,
            PlanTier::GrowingBusiness => Self::GrowingBusiness,
        }
    }
}

/// Where a billing record sits in the subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Free trial that has not expired yet.
    Trial,
    /// Paid subscription in good standing.
    Paid,
    /// Cancellation requested; paid access continues until `expires`.
    Cancelling,
    /// Past `expires` without renewal.
    Expired,
}

/// Persisted subscription/trial state for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Record id, assigned by the store on creation.
    pub id: BillingRecordId,

    /// The user who owns this record.
    pub owner_id: UserId,

    /// Customer reference at the payment provider.
    pub provider_customer_id: Option<String>,

    /// Current plan.
    pub plan: Plan,

    /// Billing interval of the current paid plan.
    pub interval: Option<BillingInterval>,

    /// Whether the user ever started a trial.
    pub has_trial: bool,

    /// Whether the record is currently on its free trial.
    pub is_on_trial: bool,

    /// Whether the user asked to cancel.
    pub is_cancel: bool,

    /// Instant after which, absent renewal, access lapses.
    pub expires: DateTime<Utc>,

    /// Provider payment-method ids, in attachment order.
    #[serde(default)]
    pub cards_on_file: Vec<String>,

    /// Why the user did not buy after the trial.
    #[serde(default)]
    pub reason_not_purchase: Option<String>,

    /// Free-text feedback after the trial.
    #[serde(default)]
    pub feedback_after_trial: Option<String>,

    /// The last sweep run that reconciled this record.
    #[serde(default)]
    pub last_sweep_run: Option<SweepRunId>,

    /// Optimistic-concurrency version, bumped on every update.
    #[serde(default)]
    pub version: u64,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl BillingRecord {
    /// Build a trial record for a freshly created provider customer.
    ///
    /// The id and version are placeholders until the store assigns them.
    #[must_use]
    pub fn new_trial(
        owner_id: UserId,
        provider_customer_id: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BillingRecordId::generate(),
            owner_id,
            provider_customer_id: Some(provider_customer_id.into()),
            plan: Plan::Free,
            interval: None,
            has_trial: true,
            is_on_trial: true,
            is_cancel: false,
            expires,
            cards_on_file: Vec::new(),
            reason_not_purchase: None,
            feedback_after_trial: None,
            last_sweep_run: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `expires` lies before `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }

    /// Lifecycle state at `now`.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> LifecycleState {
        if self.is_expired(now) {
            LifecycleState::Expired
        } else if self.is_on_trial {
            LifecycleState::Trial
        } else if self.is_cancel {
            LifecycleState::Cancelling
        } else {
            LifecycleState::Paid
        }
    }

    /// The provider customer id, if the record has one.
    #[must_use]
    pub fn customer_id(&self) -> Option<&str> {
        self.provider_customer_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}
