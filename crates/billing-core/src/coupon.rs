//! Coupon policy that can be decided without asking the payment provider.
//!
//! Existence, expiry and percentage of a coupon are the provider's business;
//! this module only knows which codes are restricted to monthly plans and
//! which promo codes lengthen a trial.

use crate::catalog::BillingInterval;
use crate::error::{BillingError, Result};

/// Coupons that may only be applied to monthly plans (upper-case).
const MONTHLY_ONLY_COUPONS: [&str; 4] = ["FAVORITES", "PRCOUTURE", "CURIOUS", "PRCONSULTANTS"];

/// Promo codes that lengthen the free trial (upper-case).
const TRIAL_EXTENSION_CODES: [&str; 2] = ["PRCOUTURE", "GOPUBLIX"];

/// Number of months a trial-extension promo code adds.
pub const TRIAL_EXTENSION_MONTHS: u32 = 3;

const MONTHLY_ONLY_MESSAGE: &str =
    "Sorry - you can't use this coupon code on a yearly plan. Please switch the monthly one to use this!";

/// Canonical form of a coupon code as the provider stores it.
#[must_use]
pub fn normalize_coupon(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Check the coupon/interval combination and return the normalised code.
///
/// # Errors
///
/// Returns `BillingError::Validation` for an empty code, or for a
/// monthly-only code used with an annual plan.
pub fn validate_coupon_for_interval(code: &str, interval: BillingInterval) -> Result<String> {
    let code = normalize_coupon(code);
    if code.is_empty() {
        return Err(BillingError::validation("Please enter a coupon"));
    }

    if interval == BillingInterval::Annually && MONTHLY_ONLY_COUPONS.contains(&code.as_str()) {
        return Err(BillingError::validation(MONTHLY_ONLY_MESSAGE));
    }

    Ok(code)
}

/// Months a promo code adds to a freshly started trial, if any.
#[must_use]
pub fn trial_extension_months(promo_code: &str) -> Option<u32> {
    let code = normalize_coupon(promo_code);
    TRIAL_EXTENSION_CODES
        .contains(&code.as_str())
        .then_some(TRIAL_EXTENSION_MONTHS)
}
