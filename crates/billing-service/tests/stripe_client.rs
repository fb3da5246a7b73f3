//! Stripe client tests against a mock HTTP server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{
    body_string_contains, header_exists, method, path, path_regex, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use billing_service::gateway::{GatewayError, GatewayOperation, PaymentGateway};
use billing_service::StripeClient;

fn client(server: &MockServer) -> StripeClient {
    StripeClient::new("sk_test_123", server.uri(), Duration::from_secs(5)).unwrap()
}

fn subscription(id: &str, item: &str) -> serde_json::Value {
    json!({
        "id": id,
        "status": "active",
        "current_period_end": 1_900_000_000,
        "items": { "data": [{ "id": item }], "has_more": false }
    })
}

#[tokio::test]
async fn create_customer_starts_trial_subscription() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/customers"))
        .and(header_exists("authorization"))
        .and(body_string_contains("email=a%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_42" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/subscriptions"))
        .and(body_string_contains("customer=cus_42"))
        .and(body_string_contains("free-trial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_trial",
            "status": "trialing",
            "trial_end": 1_800_000_000,
            "current_period_end": 1_800_000_000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let customer = client(&server)
        .create_customer("a@example.com", "free-trial")
        .await
        .unwrap();

    assert_eq!(customer.id, "cus_42");
    assert_eq!(customer.trial_end.unwrap().timestamp(), 1_800_000_000);
}

#[tokio::test]
async fn structured_error_surfaces_provider_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "message": "Your card was declined."
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_subscription("cus_1", "personal", None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GatewayError::Provider {
            error_type: "card_error".into(),
            message: "Your card was declined.".into(),
            code: Some("card_declined".into()),
        }
    );
    assert_eq!(
        err.user_message(GatewayOperation::CreateSubscription),
        "Your card was declined."
    );
}

#[tokio::test]
async fn unstructured_error_uses_generic_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_subscription("cus_1", "personal", Some("LAUNCH50"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Http(_)));
    assert_eq!(
        err.user_message(GatewayOperation::CreateSubscription),
        "We had an error setting your subscription"
    );
}

#[tokio::test]
async fn create_subscription_sends_coupon() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/subscriptions"))
        .and(body_string_contains("coupon=LAUNCH50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription("sub_9", "si_9")))
        .expect(1)
        .mount(&server)
        .await;

    let sub = client(&server)
        .create_subscription("cus_1", "business-yearly", Some("LAUNCH50"))
        .await
        .unwrap();

    assert_eq!(sub.id, "sub_9");
    assert_eq!(sub.period_end.timestamp(), 1_900_000_000);
}

#[tokio::test]
async fn cancel_with_no_subscriptions_deletes_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .and(query_param("customer", "cus_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [], "has_more": false })),
        )
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancelled = client(&server).cancel_all_subscriptions("cus_1").await.unwrap();
    assert_eq!(cancelled, 0);
}

#[tokio::test]
async fn cancel_deletes_every_subscription() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [subscription("sub_a", "si_a"), subscription("sub_b", "si_b")],
            "has_more": false
        })))
        .mount(&server)
        .await;

    for id in ["sub_a", "sub_b"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/subscriptions/{id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": id, "status": "canceled" })),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let cancelled = client(&server).cancel_all_subscriptions("cus_1").await.unwrap();
    assert_eq!(cancelled, 2);
}

#[tokio::test]
async fn preview_without_subscription_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/invoices/upcoming"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let preview = client(&server)
        .preview_proration("cus_1", "business", 1_700_000_000)
        .await
        .unwrap();
    assert!(preview.is_none());
}

#[tokio::test]
async fn preview_requests_upcoming_invoice_at_proration_date() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [subscription("sub_1", "si_1")]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/invoices/upcoming"))
        .and(query_param("subscription", "sub_1"))
        .and(query_param("subscription_items[0][id]", "si_1"))
        .and(query_param("subscription_items[0][plan]", "business"))
        .and(query_param("subscription_proration_date", "1700000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lines": {
                "data": [
                    { "amount": -999, "period": { "start": 1_700_000_000, "end": 1_702_000_000 } },
                    { "amount": 3599, "period": { "start": 1_700_000_000, "end": 1_702_000_000 } },
                    { "amount": 3599, "period": { "start": 1_702_000_000, "end": 1_704_000_000 } }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let preview = client(&server)
        .preview_proration("cus_1", "business", 1_700_000_000)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(preview.lines.len(), 3);
    assert_eq!(preview.lines[0].amount, -999);
    assert_eq!(preview.lines[2].period_start, 1_702_000_000);
}

#[tokio::test]
async fn list_cards_marks_default() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customers/cus_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cus_1",
            "invoice_settings": { "default_payment_method": "pm_2" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/customers/cus_1/payment_methods"))
        .and(query_param("type", "card"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "pm_1", "card": { "brand": "visa", "last4": "4242" } },
                { "id": "pm_2", "card": { "brand": "mastercard", "last4": "4444" } }
            ]
        })))
        .mount(&server)
        .await;

    let cards = client(&server).list_cards("cus_1").await.unwrap();

    assert_eq!(cards.len(), 2);
    assert!(!cards[0].is_default);
    assert!(cards[1].is_default);
    assert_eq!(cards[1].last_four, "4444");
    assert_eq!(cards[1].brand, "mastercard");
}

#[tokio::test]
async fn attach_sets_default_payment_method() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/payment_methods/pm_new/attach"))
        .and(body_string_contains("customer=cus_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "pm_new" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/customers/cus_1"))
        .and(body_string_contains("pm_new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_1" })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .attach_payment_method("cus_1", "pm_new")
        .await
        .unwrap();
}

#[tokio::test]
async fn balance_and_charges() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customers/cus_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_1", "balance": -500 })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/charges"))
        .and(query_param("customer", "cus_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "ch_1", "amount": 1899, "created": 1_700_000_000, "paid": true }
            ]
        })))
        .mount(&server)
        .await;

    let stripe = client(&server);
    assert_eq!(stripe.get_balance("cus_1").await.unwrap(), -500);

    let charges = stripe.list_charges("cus_1").await.unwrap();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount, 1899);
    assert_eq!(charges[0].created_at.timestamp(), 1_700_000_000);
    assert!(charges[0].paid);
}

#[tokio::test]
async fn lookup_coupon_reports_livemode() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coupons/CURIOUS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "CURIOUS",
            "percent_off": 20.0,
            "valid": true,
            "livemode": false
        })))
        .mount(&server)
        .await;

    let coupon = client(&server).lookup_coupon("CURIOUS").await.unwrap();

    assert_eq!(coupon.id, "CURIOUS");
    assert_eq!(coupon.percent_off, Some(20.0));
    assert!(coupon.valid);
    assert!(!coupon.live);
}

#[tokio::test]
async fn malformed_success_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coupons/BROKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).lookup_coupon("BROKEN").await.unwrap_err();

    assert!(matches!(err, GatewayError::Decode(_)));
    assert_eq!(
        err.user_message(GatewayOperation::LookupCoupon),
        "Your coupon was invalid"
    );
}

// ============================================================================
// URL building
// ============================================================================

#[tokio::test]
async fn ids_are_encoded_as_single_path_segments() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customers/cus_x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_x" })))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex("^/coupons/[^/]+$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "resource_missing",
                "message": "No such coupon"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .lookup_coupon("../customers/cus_x")
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Provider { .. }));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/coupons/..%2Fcustomers%2Fcus_x");
}

#[tokio::test]
async fn dot_and_empty_ids_are_rejected_before_sending() {
    let server = MockServer::start().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let stripe = client(&server);
    for code in ["..", ".", ""] {
        let err = stripe.lookup_coupon(code).await.unwrap_err();
        assert_eq!(err, GatewayError::InvalidIdentifier(code.to_string()));
        assert_eq!(
            err.user_message(GatewayOperation::LookupCoupon),
            "Your coupon was invalid"
        );
    }
    assert!(matches!(
        stripe.get_balance("").await.unwrap_err(),
        GatewayError::InvalidIdentifier(_)
    ));
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/customers/cus_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_1", "balance": 250 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stripe = StripeClient::new(
        "sk_test_123",
        format!("{}/v1/", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();

    assert_eq!(stripe.get_balance("cus_1").await.unwrap(), 250);
}

#[tokio::test]
async fn unusable_base_url_is_a_configuration_error() {
    let err = StripeClient::new("sk_test_123", "not a url", Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, GatewayError::Configuration(_)));
}
