//! HTTP payout channel tests against a mock provider.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use z_ledger_core::{AccountType, PayoutDestination};
use z_ledger_service::config::PayoutProviderConfig;
use z_ledger_service::{HttpPayoutChannel, PayoutChannel, PayoutError, PayoutRequest};

fn provider_config(base_url: &str) -> PayoutProviderConfig {
    PayoutProviderConfig {
        base_url: base_url.to_string(),
        secret_key: "sk-test".into(),
        callback_token: None,
        currency: "IDR".into(),
    }
}

fn request(account_type: AccountType, provider: &str) -> PayoutRequest {
    PayoutRequest {
        idempotency_key: "withdrawal-01J0000000000000000000TEST".into(),
        reference_id: "WD-01J0000000000000000000TEST".into(),
        destination: PayoutDestination {
            account_type,
            provider: provider.into(),
            account_number: "1234567890".into(),
            holder_name: "Bob Example".into(),
        },
        amount: 150_350,
        currency: "IDR".into(),
        description: "Withdrawal for user bob".into(),
    }
}

#[tokio::test]
async fn submits_payout_with_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/payouts"))
        .and(header("Idempotency-key", "withdrawal-01J0000000000000000000TEST"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "reference_id": "WD-01J0000000000000000000TEST",
            "channel_code": "ID_BCA",
            "amount": 150_350,
            "currency": "IDR",
            "channel_properties": {
                "account_holder_name": "Bob Example",
                "account_number": "1234567890",
            },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "disb-123",
            "status": "ACCEPTED",
            "reference_id": "WD-01J0000000000000000000TEST",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = HttpPayoutChannel::new(&provider_config(&server.uri())).unwrap();
    let receipt = channel
        .submit(&request(AccountType::Bank, "bca"))
        .await
        .unwrap();

    assert_eq!(receipt.payout_id, "disb-123");
    assert_eq!(receipt.status, "ACCEPTED");
}

#[tokio::test]
async fn ewallet_destinations_use_wallet_channel_codes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/payouts"))
        .and(body_partial_json(json!({ "channel_code": "ID_OVO" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "disb-9", "status": "PENDING" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let channel = HttpPayoutChannel::new(&provider_config(&server.uri())).unwrap();
    let receipt = channel
        .submit(&request(AccountType::Ewallet, "OVO"))
        .await
        .unwrap();

    assert_eq!(receipt.status, "PENDING");
}

#[tokio::test]
async fn provider_errors_are_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/payouts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_code": "INVALID_DESTINATION",
            "message": "account number is invalid",
        })))
        .mount(&server)
        .await;

    let channel = HttpPayoutChannel::new(&provider_config(&server.uri())).unwrap();
    let err = channel
        .submit(&request(AccountType::Bank, "BCA"))
        .await
        .unwrap_err();

    match err {
        PayoutError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("INVALID_DESTINATION"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_provider_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let channel = HttpPayoutChannel::new(&provider_config(&server.uri())).unwrap();
    let err = channel
        .submit(&request(AccountType::Bank, "Chase"))
        .await
        .unwrap_err();

    assert!(matches!(err, PayoutError::UnsupportedProvider { .. }));
}

#[test]
fn empty_secret_key_is_a_configuration_error() {
    let mut config = provider_config("http://localhost");
    config.secret_key = String::new();

    assert!(matches!(
        HttpPayoutChannel::new(&config),
        Err(PayoutError::Configuration(_))
    ));
}
