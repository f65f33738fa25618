//! HTTP-level tests for the hosted checkout provider client, against a
//! local mock server.

use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_checkout::payments::{
    CheckoutMetadata, CreateSessionRequest, FrozenLine, PaymentProvider, ProviderError,
    ProviderLineItem, StripeCheckoutProvider,
};

fn sample_request(discount: Option<i32>) -> CreateSessionRequest {
    let product_id = Uuid::new_v4();
    CreateSessionRequest {
        line_items: vec![ProviderLineItem {
            name: "Widget".to_string(),
            unit_amount_minor: 1000,
            quantity: 2,
        }],
        currency: "usd".to_string(),
        discount_percentage: discount,
        success_url: "http://shop.test/purchase-success?session_id={CHECKOUT_SESSION_ID}"
            .to_string(),
        cancel_url: "http://shop.test/purchase-cancel".to_string(),
        client_reference: "ref-1".to_string(),
        metadata: CheckoutMetadata {
            user_id: Uuid::new_v4(),
            coupon_code: None,
            coupon_id: None,
            lines: vec![FrozenLine {
                product_id,
                name: "Widget".to_string(),
                unit_price: dec!(10.00),
                quantity: 2,
            }],
        },
    }
}

#[tokio::test]
async fn create_session_posts_line_items_and_returns_redirect() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", "Bearer sk_test_key"))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains("unit_amount%5D=1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_abc",
            "url": "https://pay.test/cs_test_abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = StripeCheckoutProvider::new(server.uri(), "sk_test_key");
    let session = provider.create_session(sample_request(None)).await.unwrap();

    assert_eq!(session.id, "cs_test_abc");
    assert_eq!(session.url, "https://pay.test/cs_test_abc");
}

#[tokio::test]
async fn discount_creates_a_single_use_provider_coupon() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/coupons"))
        .and(body_string_contains("percent_off=10"))
        .and(body_string_contains("duration=once"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "co_10"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(body_string_contains("coupon%5D=co_10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_disc",
            "url": "https://pay.test/cs_test_disc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = StripeCheckoutProvider::new(server.uri(), "sk_test_key");
    let session = provider
        .create_session(sample_request(Some(10)))
        .await
        .unwrap();

    assert_eq!(session.id, "cs_test_disc");
}

#[tokio::test]
async fn retrieve_session_decodes_payment_state_and_metadata() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let snapshot = serde_json::to_string(&CheckoutMetadata {
        user_id,
        coupon_code: Some("WELCOME10".to_string()),
        coupon_id: Some(Uuid::new_v4()),
        lines: vec![FrozenLine {
            product_id: Uuid::new_v4(),
            name: "Widget".to_string(),
            unit_price: dec!(10.00),
            quantity: 2,
        }],
    })
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_test_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_abc",
            "url": null,
            "payment_status": "paid",
            "payment_intent": "pi_789",
            "amount_total": 1800,
            "metadata": {"checkout": snapshot}
        })))
        .mount(&server)
        .await;

    let provider = StripeCheckoutProvider::new(server.uri(), "sk_test_key");
    let status = provider.retrieve_session("cs_test_abc").await.unwrap();

    assert!(status.paid);
    assert_eq!(status.reference, "pi_789");
    assert_eq!(status.amount_total, dec!(18.00));
    assert_eq!(status.metadata.user_id, user_id);
    assert_eq!(status.metadata.lines[0].unit_price, dec!(10.00));
}

#[tokio::test]
async fn api_error_surfaces_status_code() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"message": "No such checkout.session"}
        })))
        .mount(&server)
        .await;

    let provider = StripeCheckoutProvider::new(server.uri(), "sk_test_key");
    let err = provider.retrieve_session("cs_missing").await.unwrap_err();

    match err {
        ProviderError::Api { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    // Port 1 is never listening locally.
    let provider = StripeCheckoutProvider::new("http://127.0.0.1:1", "sk_test_key");
    let err = provider.retrieve_session("cs_any").await.unwrap_err();

    assert!(matches!(err, ProviderError::Unreachable(_)));
}
