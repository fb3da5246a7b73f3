//! Payment provider gateway.
//!
//! The lifecycle engine talks to the payment provider only through the
//! [`PaymentGateway`] trait. The production implementation is
//! [`crate::stripe::StripeClient`]; tests inject stubs.
//!
//! # Error mapping
//!
//! Provider failures come back as [`GatewayError`]. Before they reach a user
//! they pass through [`GatewayError::user_message`]: a structured provider
//! error surfaces its own message, anything else (transport failure, timeout,
//! unparseable body) is replaced by the generic text of the
//! [`GatewayOperation`] that failed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Errors returned by a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The provider answered with a structured `{type, message}` error.
    #[error("provider error: {error_type} - {message}")]
    Provider {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Transport failure or a non-success status without a structured body.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The call did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An identifier that cannot name a provider resource.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

impl GatewayError {
    /// The message that may be shown to the end user.
    #[must_use]
    pub fn user_message(&self, operation: GatewayOperation) -> String {
        match self {
            Self::Provider { message, .. } if !message.is_empty() => message.clone(),
            _ => operation.fallback_message().to_string(),
        }
    }
}

/// The gateway operations, used for logging and fallback messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOperation {
    /// Create a provider customer on its trial plan.
    CreateCustomer,
    /// Cancel every subscription of a customer.
    CancelSubscriptions,
    /// Start a paid subscription.
    CreateSubscription,
    /// Preview the proration of a plan switch.
    PreviewProration,
    /// List the customer's cards.
    ListCards,
    /// Attach a payment method.
    AttachPaymentMethod,
    /// Read the customer balance.
    GetBalance,
    /// List past charges.
    ListCharges,
    /// Look up a coupon.
    LookupCoupon,
}

impl GatewayOperation {
    /// Stable name for logs and error payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateCustomer => "create_customer",
            Self::CancelSubscriptions => "cancel_subscriptions",
            Self::CreateSubscription => "create_subscription",
            Self::PreviewProration => "preview_proration",
            Self::ListCards => "list_cards",
            Self::AttachPaymentMethod => "attach_payment_method",
            Self::GetBalance => "get_balance",
            Self::ListCharges => "list_charges",
            Self::LookupCoupon => "lookup_coupon",
        }
    }

    /// Generic user-facing message used when the provider error is unstructured.
    #[must_use]
    pub const fn fallback_message(self) -> &'static str {
        match self {
            Self::CreateCustomer => "We had an error setting up your trial",
            Self::CancelSubscriptions => "We had an error getting your user",
            Self::CreateSubscription => "We had an error setting your subscription",
            Self::PreviewProration => "We had an error getting your plan preview",
            Self::ListCards => "We had an error getting your cards",
            Self::AttachPaymentMethod => "We had an error setting your payment method",
            Self::GetBalance => "We had an error getting your balance",
            Self::ListCharges => "We had an error getting your billing history",
            Self::LookupCoupon => "Your coupon was invalid",
        }
    }
}

/// A customer freshly created at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCustomer {
    /// Provider customer id (`cus_...`).
    pub id: String,
    /// End of the provider-side trial, when the provider reports one.
    pub trial_end: Option<DateTime<Utc>>,
}

/// A subscription created at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscription {
    /// Provider subscription id.
    pub id: String,
    /// End of the current billing period.
    pub period_end: DateTime<Utc>,
}

/// One line of an upcoming-invoice preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    /// Amount in minor units (may be negative for credits).
    pub amount: i64,
    /// Unix timestamp of the line's period start.
    pub period_start: i64,
}

/// Upcoming invoice for a hypothetical plan switch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvoicePreview {
    /// Invoice lines.
    pub lines: Vec<InvoiceLine>,
}

/// A card attached to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    /// Provider payment-method id.
    pub id: String,
    /// Last four digits.
    pub last_four: String,
    /// Card brand (visa, amex, ...).
    pub brand: String,
    /// Whether this is the customer's default payment method.
    pub is_default: bool,
}

/// A past charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    /// Amount in minor units.
    pub amount: i64,
    /// When the charge was created.
    pub created_at: DateTime<Utc>,
    /// Whether the charge succeeded.
    pub paid: bool,
}

/// A coupon as the provider knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon {
    /// Coupon code.
    pub id: String,
    /// Percentage discount, if this is a percent-off coupon.
    pub percent_off: Option<f64>,
    /// Whether the coupon can still be redeemed.
    pub valid: bool,
    /// Whether the coupon exists in live mode.
    pub live: bool,
}

/// Operations the lifecycle engine needs from the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer subscribed to `trial_plan`.
    async fn create_customer(
        &self,
        email: &str,
        trial_plan: &str,
    ) -> Result<ProviderCustomer, GatewayError>;

    /// Cancel every subscription of the customer. Returns how many were
    /// cancelled; zero is a success.
    async fn cancel_all_subscriptions(&self, customer_id: &str) -> Result<usize, GatewayError>;

    /// Start a subscription to `plan_id`, optionally with a coupon.
    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
        coupon: Option<&str>,
    ) -> Result<ProviderSubscription, GatewayError>;

    /// Preview the upcoming invoice if the customer's subscription switched
    /// to `plan_id` at `proration_date` (unix seconds).
    ///
    /// Returns `None` when the customer has no active subscription.
    async fn preview_proration(
        &self,
        customer_id: &str,
        plan_id: &str,
        proration_date: i64,
    ) -> Result<Option<InvoicePreview>, GatewayError>;

    /// List the customer's cards, in provider order.
    async fn list_cards(&self, customer_id: &str) -> Result<Vec<Card>, GatewayError>;

    /// Attach a tokenised payment method and make it the default.
    async fn attach_payment_method(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<(), GatewayError>;

    /// Customer balance in minor units.
    async fn get_balance(&self, customer_id: &str) -> Result<i64, GatewayError>;

    /// Past charges, in provider order.
    async fn list_charges(&self, customer_id: &str) -> Result<Vec<Charge>, GatewayError>;

    /// Look up a coupon by (upper-case) code.
    async fn lookup_coupon(&self, code: &str) -> Result<Coupon, GatewayError>;
}

/// Gateway used when no provider credentials are configured. Every call
/// fails with `GatewayError::Configuration`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGateway;

impl UnconfiguredGateway {
    fn error<T>() -> Result<T, GatewayError> {
        Err(GatewayError::Configuration(
            "payment provider is not configured".to_string(),
        ))
    }
}

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_customer(&self, _: &str, _: &str) -> Result<ProviderCustomer, GatewayError> {
        Self::error()
    }

    async fn cancel_all_subscriptions(&self, _: &str) -> Result<usize, GatewayError> {
        Self::error()
    }

    async fn create_subscription(
        &self,
        _: &str,
        _: &str,
        _: Option<&str>,
    ) -> Result<ProviderSubscription, GatewayError> {
        Self::error()
    }

    async fn preview_proration(
        &self,
        _: &str,
        _: &str,
        _: i64,
    ) -> Result<Option<InvoicePreview>, GatewayError> {
        Self::error()
    }

    async fn list_cards(&self, _: &str) -> Result<Vec<Card>, GatewayError> {
        Self::error()
    }

    async fn attach_payment_method(&self, _: &str, _: &str) -> Result<(), GatewayError> {
        Self::error()
    }

    async fn get_balance(&self, _: &str) -> Result<i64, GatewayError> {
        Self::error()
    }

    async fn list_charges(&self, _: &str) -> Result<Vec<Charge>, GatewayError> {
        Self::error()
    }

    async fn lookup_coupon(&self, _: &str) -> Result<Coupon, GatewayError> {
        Self::error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_errors_surface_provider_message() {
        let err = GatewayError::Provider {
            error_type: "card_error".into(),
            message: "Your card was declined.".into(),
            code: Some("card_declined".into()),
        };
        assert_eq!(
            err.user_message(GatewayOperation::CreateSubscription),
            "Your card was declined."
        );
    }

    #[test]
    fn unstructured_errors_use_generic_message() {
        let errors = [
            GatewayError::Http("HTTP 500 Internal Server Error".into()),
            GatewayError::Timeout(Duration::from_secs(15)),
            GatewayError::Decode("missing field `id`".into()),
        ];
        for err in errors {
            assert_eq!(
                err.user_message(GatewayOperation::CreateSubscription),
                "We had an error setting your subscription"
            );
            assert_eq!(
                err.user_message(GatewayOperation::CancelSubscriptions),
                "We had an error getting your user"
            );
        }
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_every_call() {
        let gateway = UnconfiguredGateway;
        let err = gateway.lookup_coupon("CURIOUS").await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
        assert_eq!(
            err.user_message(GatewayOperation::LookupCoupon),
            "Your coupon was invalid"
        );
    }
}
