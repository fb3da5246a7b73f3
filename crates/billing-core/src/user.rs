//! The slice of a user account the billing service reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BillingRecordId, UserId};

/// User account fields consumed by billing.
///
/// The account itself belongs to the user subsystem; billing only flips
/// `is_active`, links `billing_record_id`, and notes trial feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// The user ID.
    pub id: UserId,

    /// Email address, sent to the payment provider on customer creation.
    pub email: String,

    /// Whether the user currently has access to the product.
    pub is_active: bool,

    /// Link to the user's billing record, once a trial has started.
    pub billing_record_id: Option<BillingRecordId>,

    /// Promo code captured at sign-up.
    #[serde(default)]
    pub promo_code: Option<String>,

    /// Whether the user already gave post-trial feedback.
    #[serde(default)]
    pub trial_feedback: bool,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Create an inactive account with no billing link.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            is_active: false,
            billing_record_id: None,
            promo_code: None,
            trial_feedback: false,
            created_at: now,
            updated_at: now,
        }
    }
}
