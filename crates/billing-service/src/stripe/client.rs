//! Stripe API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};

use super::types::{
    Charge as StripeCharge, Coupon as StripeCoupon, Customer, Invoice, PaymentMethod,
    StripeErrorResponse, StripeList, Subscription,
};
use crate::gateway::{
    Card, Charge, Coupon, GatewayError, InvoiceLine, InvoicePreview, PaymentGateway,
    ProviderCustomer, ProviderSubscription,
};

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `base_url` - API root, [`Self::DEFAULT_BASE_URL`] outside of tests
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Configuration` if the HTTP client cannot be built
    /// or `base_url` is not a URL that can carry a path.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| GatewayError::Configuration(format!("invalid base URL: {base_url}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url,
        })
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    ///
    /// Empty, `.` and `..` segments are rejected so an id can never
    /// address a different resource.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(GatewayError::InvalidIdentifier((*bad).to_string()));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                GatewayError::Configuration(format!("invalid base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(self.url(segments)?)
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(query)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(self.url(segments)?)
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn delete<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .delete(self.url(segments)?)
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Subscription>, GatewayError> {
        let list: StripeList<Subscription> = self
            .get(
                &["subscriptions"],
                &[("customer", customer_id), ("limit", "100")],
            )
            .await?;
        Ok(list.data)
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Customer, GatewayError> {
        self.get(&["customers", customer_id], &[]).await
    }

    /// Handle API response and convert errors.
    ///
    /// A structured `{"error": {...}}` body becomes `GatewayError::Provider`;
    /// any other failure body becomes `GatewayError::Http`.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| GatewayError::Decode(e.to_string()));
        }

        match serde_json::from_slice::<StripeErrorResponse>(&body) {
            Ok(stripe_error) => Err(GatewayError::Provider {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(GatewayError::Http(format!("HTTP {status}"))),
        }
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, GatewayError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| GatewayError::Decode(format!("timestamp out of range: {secs}")))
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(
        &self,
        email: &str,
        trial_plan: &str,
    ) -> Result<ProviderCustomer, GatewayError> {
        let customer: Customer = self
            .post(&["customers"], &[("email", email.to_string())])
            .await?;

        let subscription: Subscription = self
            .post(
                &["subscriptions"],
                &[
                    ("customer", customer.id.clone()),
                    ("items[0][plan]", trial_plan.to_string()),
                ],
            )
            .await?;

        let trial_end = subscription
            .trial_end
            .or(subscription.current_period_end)
            .map(timestamp)
            .transpose()?;

        tracing::debug!(customer_id = %customer.id, trial_plan, "Stripe customer created");

        Ok(ProviderCustomer {
            id: customer.id,
            trial_end,
        })
    }

    async fn cancel_all_subscriptions(&self, customer_id: &str) -> Result<usize, GatewayError> {
        let subscriptions = self.list_subscriptions(customer_id).await?;
        let count = subscriptions.len();

        for subscription in subscriptions {
            let _: Subscription = self
                .delete(&["subscriptions", &subscription.id])
                .await?;
            tracing::debug!(
                customer_id,
                subscription_id = %subscription.id,
                status = %subscription.status,
                "Stripe subscription cancelled"
            );
        }

        Ok(count)
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
        coupon: Option<&str>,
    ) -> Result<ProviderSubscription, GatewayError> {
        let mut params = vec![
            ("customer", customer_id.to_string()),
            ("items[0][plan]", plan_id.to_string()),
        ];
        if let Some(coupon) = coupon {
            params.push(("coupon", coupon.to_string()));
        }

        let subscription: Subscription = self.post(&["subscriptions"], &params).await?;
        let period_end = subscription.current_period_end.ok_or_else(|| {
            GatewayError::Decode("subscription has no current_period_end".to_string())
        })?;

        Ok(ProviderSubscription {
            id: subscription.id,
            period_end: timestamp(period_end)?,
        })
    }

    async fn preview_proration(
        &self,
        customer_id: &str,
        plan_id: &str,
        proration_date: i64,
    ) -> Result<Option<InvoicePreview>, GatewayError> {
        let subscriptions = self.list_subscriptions(customer_id).await?;
        let Some(subscription) = subscriptions.into_iter().next() else {
            return Ok(None);
        };
        let Some(item) = subscription
            .items
            .and_then(|items| items.data.into_iter().next())
        else {
            return Ok(None);
        };

        let proration_date = proration_date.to_string();
        let invoice: Invoice = self
            .get(
                &["invoices", "upcoming"],
                &[
                    ("customer", customer_id),
                    ("subscription", &subscription.id),
                    ("subscription_items[0][id]", &item.id),
                    ("subscription_items[0][plan]", plan_id),
                    ("subscription_proration_date", &proration_date),
                ],
            )
            .await?;

        Ok(Some(InvoicePreview {
            lines: invoice
                .lines
                .data
                .into_iter()
                .map(|line| InvoiceLine {
                    amount: line.amount,
                    period_start: line.period.start,
                })
                .collect(),
        }))
    }

    async fn list_cards(&self, customer_id: &str) -> Result<Vec<Card>, GatewayError> {
        let customer = self.get_customer(customer_id).await?;
        let default = customer
            .invoice_settings
            .and_then(|s| s.default_payment_method)
            .or(customer.default_source);

        let methods: StripeList<PaymentMethod> = self
            .get(
                &["customers", customer_id, "payment_methods"],
                &[("type", "card")],
            )
            .await?;

        Ok(methods
            .data
            .into_iter()
            .map(|method| {
                let card = method.card.unwrap_or_default();
                Card {
                    is_default: default.as_deref() == Some(method.id.as_str()),
                    id: method.id,
                    last_four: card.last4,
                    brand: card.brand,
                }
            })
            .collect())
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<(), GatewayError> {
        let _: PaymentMethod = self
            .post(
                &["payment_methods", token, "attach"],
                &[("customer", customer_id.to_string())],
            )
            .await?;

        let _: Customer = self
            .post(
                &["customers", customer_id],
                &[(
                    "invoice_settings[default_payment_method]",
                    token.to_string(),
                )],
            )
            .await?;

        Ok(())
    }

    async fn get_balance(&self, customer_id: &str) -> Result<i64, GatewayError> {
        Ok(self.get_customer(customer_id).await?.balance)
    }

    async fn list_charges(&self, customer_id: &str) -> Result<Vec<Charge>, GatewayError> {
        let list: StripeList<StripeCharge> = self
            .get(&["charges"], &[("customer", customer_id), ("limit", "100")])
            .await?;

        list.data
            .into_iter()
            .map(|charge| {
                Ok(Charge {
                    amount: charge.amount,
                    created_at: timestamp(charge.created)?,
                    paid: charge.paid,
                })
            })
            .collect()
    }

    async fn lookup_coupon(&self, code: &str) -> Result<Coupon, GatewayError> {
        let coupon: StripeCoupon = self.get(&["coupons", code], &[]).await?;
        Ok(Coupon {
            id: coupon.id,
            percent_off: coupon.percent_off,
            valid: coupon.valid,
            live: coupon.livemode,
        })
    }
}
