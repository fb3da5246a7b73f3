//! Common test utilities for billing integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::{DateTime, Utc};

use billing_core::{BillingRecord, BillingRecordId, UserAccount, UserId};
use billing_service::gateway::{
    Card, Charge, Coupon, GatewayError, InvoiceLine, InvoicePreview, PaymentGateway,
    ProviderCustomer, ProviderSubscription,
};
use billing_service::{create_router, AppState, EngineSettings, LifecycleEngine, ServiceConfig};
use billing_store::{MemoryStore, Store, StoreError};

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Operation name, e.g. "create_subscription".
    pub op: &'static str,
    /// Arguments, in order.
    pub args: Vec<String>,
}

/// Scriptable in-process payment gateway that records every call.
pub struct StubGateway {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, GatewayError>>,
    delay: Mutex<Option<Duration>>,
    /// Id returned by `create_customer`.
    pub customer_id: Mutex<String>,
    /// Trial end returned by `create_customer`.
    pub trial_end: Mutex<Option<DateTime<Utc>>>,
    /// Period end returned by `create_subscription`.
    pub period_end: Mutex<DateTime<Utc>>,
    /// Subscriptions `cancel_all_subscriptions` reports as cancelled.
    pub active_subscriptions: Mutex<usize>,
    /// Preview lines as `(amount, offset from the proration instant)`.
    /// `None` means the customer has no subscription.
    pub preview: Mutex<Option<Vec<(i64, i64)>>>,
    /// Cards returned by `list_cards`.
    pub cards: Mutex<Vec<Card>>,
    /// Balance returned by `get_balance`.
    pub balance: Mutex<i64>,
    /// Charges returned by `list_charges`.
    pub charges: Mutex<Vec<Charge>>,
    /// Coupon returned by `lookup_coupon`.
    pub coupon: Mutex<Coupon>,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
            customer_id: Mutex::new("cus_1".to_string()),
            trial_end: Mutex::new(None),
            period_end: Mutex::new(Utc::now() + chrono::Duration::days(30)),
            active_subscriptions: Mutex::new(1),
            preview: Mutex::new(None),
            cards: Mutex::new(Vec::new()),
            balance: Mutex::new(0),
            charges: Mutex::new(Vec::new()),
            coupon: Mutex::new(Coupon {
                id: "CURIOUS".to_string(),
                percent_off: Some(20.0),
                valid: true,
                live: true,
            }),
        }
    }
}

impl StubGateway {
    /// Make every call to `op` fail with `err`.
    pub fn fail_on(&self, op: &'static str, err: GatewayError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    /// Make every call take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls to `op` so far.
    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.op == op).count()
    }

    /// Arguments of the last call to `op`.
    pub fn last_args(&self, op: &str) -> Option<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.op == op)
            .map(|c| c.args.clone())
    }

    async fn enter(&self, op: &'static str, args: &[&str]) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(Call {
            op,
            args: args.iter().map(ToString::to_string).collect(),
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.lock().unwrap().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_customer(
        &self,
        email: &str,
        trial_plan: &str,
    ) -> Result<ProviderCustomer, GatewayError> {
        self.enter("create_customer", &[email, trial_plan]).await?;
        Ok(ProviderCustomer {
            id: self.customer_id.lock().unwrap().clone(),
            trial_end: *self.trial_end.lock().unwrap(),
        })
    }

    async fn cancel_all_subscriptions(&self, customer_id: &str) -> Result<usize, GatewayError> {
        self.enter("cancel_all_subscriptions", &[customer_id]).await?;
        let mut active = self.active_subscriptions.lock().unwrap();
        Ok(std::mem::take(&mut *active))
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
        coupon: Option<&str>,
    ) -> Result<ProviderSubscription, GatewayError> {
        self.enter(
            "create_subscription",
            &[customer_id, plan_id, coupon.unwrap_or("")],
        )
        .await?;
        *self.active_subscriptions.lock().unwrap() += 1;
        Ok(ProviderSubscription {
            id: "sub_1".to_string(),
            period_end: *self.period_end.lock().unwrap(),
        })
    }

    async fn preview_proration(
        &self,
        customer_id: &str,
        plan_id: &str,
        proration_date: i64,
    ) -> Result<Option<InvoicePreview>, GatewayError> {
        self.enter("preview_proration", &[customer_id, plan_id]).await?;
        Ok(self.preview.lock().unwrap().as_ref().map(|lines| InvoicePreview {
            lines: lines
                .iter()
                .map(|&(amount, offset)| InvoiceLine {
                    amount,
                    period_start: proration_date + offset,
                })
                .collect(),
        }))
    }

    async fn list_cards(&self, customer_id: &str) -> Result<Vec<Card>, GatewayError> {
        self.enter("list_cards", &[customer_id]).await?;
        Ok(self.cards.lock().unwrap().clone())
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<(), GatewayError> {
        self.enter("attach_payment_method", &[customer_id, token])
            .await?;
        let mut cards = self.cards.lock().unwrap();
        for card in cards.iter_mut() {
            card.is_default = false;
        }
        cards.push(Card {
            id: token.to_string(),
            last_four: "4242".to_string(),
            brand: "visa".to_string(),
            is_default: true,
        });
        Ok(())
    }

    async fn get_balance(&self, customer_id: &str) -> Result<i64, GatewayError> {
        self.enter("get_balance", &[customer_id]).await?;
        Ok(*self.balance.lock().unwrap())
    }

    async fn list_charges(&self, customer_id: &str) -> Result<Vec<Charge>, GatewayError> {
        self.enter("list_charges", &[customer_id]).await?;
        Ok(self.charges.lock().unwrap().clone())
    }

    async fn lookup_coupon(&self, code: &str) -> Result<Coupon, GatewayError> {
        self.enter("lookup_coupon", &[code]).await?;
        let mut coupon = self.coupon.lock().unwrap().clone();
        code.clone_into(&mut coupon.id);
        Ok(coupon)
    }
}

/// A structured provider error, as Stripe would send for a declined card.
pub fn card_declined() -> GatewayError {
    GatewayError::Provider {
        error_type: "card_error".to_string(),
        message: "Your card was declined.".to_string(),
        code: Some("card_declined".to_string()),
    }
}

/// Engine over a `MemoryStore` and a `StubGateway`.
pub struct EngineHarness {
    pub engine: Arc<LifecycleEngine>,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<StubGateway>,
}

impl EngineHarness {
    /// Create a harness with default settings.
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    /// Create a harness with the given settings.
    pub fn with_settings(settings: EngineSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build(Arc::clone(&store) as Arc<dyn Store>, store, settings)
    }

    /// Create a harness whose engine writes through a [`FlakyStore`].
    pub fn with_flaky_store() -> (Self, Arc<FlakyStore>) {
        let store = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyStore::new(Arc::clone(&store)));
        let harness = Self::build(
            Arc::clone(&flaky) as Arc<dyn Store>,
            store,
            EngineSettings::default(),
        );
        (harness, flaky)
    }

    fn build(engine_store: Arc<dyn Store>, store: Arc<MemoryStore>, settings: EngineSettings) -> Self {
        let gateway = Arc::new(StubGateway::default());
        let engine = LifecycleEngine::new(
            engine_store,
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            settings,
        );

        Self {
            engine: Arc::new(engine),
            store,
            gateway,
        }
    }

    /// Register a user with no billing record.
    pub fn add_user(&self, email: &str) -> UserId {
        let owner = UserId::generate();
        self.store
            .put_user(&UserAccount::new(owner, email))
            .unwrap();
        owner
    }

    /// Register a user carrying a sign-up promo code.
    pub fn add_user_with_promo(&self, email: &str, promo: &str) -> UserId {
        let owner = UserId::generate();
        let mut user = UserAccount::new(owner, email);
        user.promo_code = Some(promo.to_string());
        self.store.put_user(&user).unwrap();
        owner
    }

    /// Insert a billing record directly, link it to a new active user, and
    /// return the owner.
    pub fn seed(&self, edit: impl FnOnce(&mut BillingRecord)) -> UserId {
        let owner = UserId::generate();
        let mut record = BillingRecord::new_trial(owner, "cus_seed", Utc::now());
        edit(&mut record);
        let record = self.store.create_billing(record).unwrap();

        let mut user = UserAccount::new(owner, format!("{owner}@example.com"));
        user.is_active = true;
        user.billing_record_id = Some(record.id);
        self.store.put_user(&user).unwrap();
        owner
    }

    pub fn user(&self, owner: &UserId) -> UserAccount {
        self.store.get_user(owner).unwrap()
    }

    pub fn record(&self, owner: &UserId) -> BillingRecord {
        self.store.get_billing_by_owner(owner).unwrap()
    }
}

/// Memory store whose record updates can be made to fail.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_updates: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
        }
    }

    /// Make every `update_billing` fail from now on.
    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }
}

impl Store for FlakyStore {
    fn get_billing(&self, id: &BillingRecordId) -> billing_store::Result<BillingRecord> {
        self.inner.get_billing(id)
    }

    fn get_billing_by_owner(&self, owner_id: &UserId) -> billing_store::Result<BillingRecord> {
        self.inner.get_billing_by_owner(owner_id)
    }

    fn create_billing(&self, record: BillingRecord) -> billing_store::Result<BillingRecord> {
        self.inner.create_billing(record)
    }

    fn update_billing(&self, record: BillingRecord) -> billing_store::Result<BillingRecord> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Database("disk unavailable".into()));
        }
        self.inner.update_billing(record)
    }

    fn get_user(&self, id: &UserId) -> billing_store::Result<UserAccount> {
        self.inner.get_user(id)
    }

    fn put_user(&self, user: &UserAccount) -> billing_store::Result<()> {
        self.inner.put_user(user)
    }

    fn list_users(&self) -> billing_store::Result<Vec<UserAccount>> {
        self.inner.list_users()
    }
}

impl Default for EngineHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP test harness around the full router.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The stub gateway behind the engine.
    pub gateway: Arc<StubGateway>,
    /// The store behind the engine.
    pub store: Arc<MemoryStore>,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh store.
    pub fn new() -> Self {
        let engine = EngineHarness::new();
        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            service_api_key: Some(service_api_key.clone()),
            ..ServiceConfig::default()
        };

        let state = AppState::new(Arc::clone(&engine.engine), config);
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            gateway: engine.gateway,
            store: engine.store,
            service_api_key,
        }
    }

    /// Header name for the service API key.
    pub fn api_key_header() -> HeaderName {
        HeaderName::from_static("x-api-key")
    }

    /// Header value carrying the configured service API key.
    pub fn api_key(&self) -> HeaderValue {
        HeaderValue::from_str(&self.service_api_key).unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
