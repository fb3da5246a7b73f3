//! Stripe API wire types.
//!
//! Only the fields the gateway reads are modelled; everything else in the
//! Stripe payloads is ignored.

use serde::Deserialize;

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Balance in cents. Negative values are credit.
    #[serde(default)]
    pub balance: i64,
    /// Invoice settings, carrying the default payment method.
    #[serde(default)]
    pub invoice_settings: Option<InvoiceSettings>,
    /// Legacy default source.
    #[serde(default)]
    pub default_source: Option<String>,
}

/// Customer invoice settings.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceSettings {
    /// Default payment method ID.
    #[serde(default)]
    pub default_payment_method: Option<String>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Status (trialing, active, `past_due`, ...).
    #[serde(default)]
    pub status: String,
    /// End of the current period (Unix).
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// End of the trial (Unix), if trialing.
    #[serde(default)]
    pub trial_end: Option<i64>,
    /// Subscription items.
    #[serde(default)]
    pub items: Option<StripeList<SubscriptionItem>>,
}

/// One item of a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// Item ID.
    pub id: String,
}

/// Upcoming invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice lines.
    pub lines: StripeList<InvoiceLineItem>,
}

/// Invoice line item.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLineItem {
    /// Amount in cents.
    #[serde(default)]
    pub amount: i64,
    /// Billing period of the line.
    pub period: Period,
}

/// A billing period.
#[derive(Debug, Clone, Deserialize)]
pub struct Period {
    /// Start (Unix).
    pub start: i64,
    /// End (Unix).
    pub end: i64,
}

/// Stripe `PaymentMethod` object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethod {
    /// Payment method ID.
    pub id: String,
    /// Card details, for card payment methods.
    #[serde(default)]
    pub card: Option<CardDetails>,
}

/// Card details of a payment method.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardDetails {
    /// Brand (visa, mastercard, ...).
    #[serde(default)]
    pub brand: String,
    /// Last four digits.
    #[serde(default)]
    pub last4: String,
}

/// Stripe charge object.
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    /// Charge ID.
    pub id: String,
    /// Amount in cents.
    #[serde(default)]
    pub amount: i64,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Whether the charge succeeded.
    #[serde(default)]
    pub paid: bool,
}

/// Stripe coupon object.
#[derive(Debug, Clone, Deserialize)]
pub struct Coupon {
    /// Coupon ID (the code).
    pub id: String,
    /// Percentage off.
    #[serde(default)]
    pub percent_off: Option<f64>,
    /// Whether it can still be redeemed.
    #[serde(default)]
    pub valid: bool,
    /// Whether it exists in live mode.
    #[serde(default)]
    pub livemode: bool,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}
