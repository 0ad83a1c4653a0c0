//! Admin, service and audit integration tests.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{PayoutScript, TestHarness, ADMIN_API_KEY, SERVICE_API_KEY};
use serde_json::{json, Value};

use z_ledger_core::{Role, UserId};
use z_ledger_service::PayoutMode;

// ============================================================================
// Credits
// ============================================================================

#[tokio::test]
async fn admin_grant_mints_coins() {
    let harness = TestHarness::new();
    let alice = harness.create_user("alice", Role::User);

    let response = harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .add_header("x-admin-id", "ops-1")
        .json(&json!({
            "userId": alice.to_string(),
            "amount": 2_500,
            "reason": "promo",
            "kind": "admin_topup",
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["balance"], 2_500);
    assert_eq!(body["transaction"]["kind"], "admin_topup");
    assert!(body["transaction"]["fromUserId"].is_null());
    assert_eq!(harness.balance(&alice), 2_500);
}

#[tokio::test]
async fn admin_grant_rejects_non_grant_kinds() {
    let harness = TestHarness::new();
    let alice = harness.create_user("alice", Role::User);

    let response = harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({
            "userId": alice.to_string(),
            "amount": 100,
            "reason": "oops",
            "kind": "call_earning",
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.balance(&alice), 0);
}

#[tokio::test]
async fn admin_endpoints_require_the_admin_key() {
    let harness = TestHarness::new();
    let alice = harness.create_user("alice", Role::User);
    let grant = json!({ "userId": alice.to_string(), "amount": 100, "reason": "promo" });

    harness
        .server
        .post("/v1/admin/credits")
        .json(&grant)
        .await
        .assert_status_unauthorized();

    harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-admin-key", "wrong")
        .json(&grant)
        .await
        .assert_status_unauthorized();

    // The service key is not an admin key.
    harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-admin-key", SERVICE_API_KEY)
        .json(&grant)
        .await
        .assert_status_unauthorized();

    assert_eq!(harness.balance(&alice), 0);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn gift_upsert_creates_then_updates() {
    let harness = TestHarness::new();

    let created: Value = harness
        .server
        .put("/v1/admin/gifts")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({ "name": "Rose", "price": 150 }))
        .await
        .json();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["price"], 150);

    let updated = harness
        .server
        .put("/v1/admin/gifts")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({ "id": id, "name": "Rose", "price": 200 }))
        .await;
    updated.assert_status_ok();

    let alice = harness.create_funded_user("alice", Role::User, 1_000);
    let quote: Value = harness
        .server
        .post("/v1/gifts/check-balance")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "giftId": id }))
        .await
        .json();
    assert_eq!(quote["price"], 200);
}

#[tokio::test]
async fn gift_with_non_positive_price_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .put("/v1/admin/gifts")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({ "name": "Free", "price": 0 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn private_rooms_cannot_be_registered() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .put("/v1/admin/rooms/private_a_b")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({ "name": "Sneaky" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Withdrawal review
// ============================================================================

fn manual_harness() -> TestHarness {
    TestHarness::with_config(|config| config.payout_mode = PayoutMode::Manual)
}

async fn pending_withdrawal(harness: &TestHarness, user: &UserId) -> String {
    harness.seed_earnings(user, 155_000);
    let account = harness.link_bank(user, "1234567890");
    let body: Value = harness
        .server
        .post("/v1/withdrawals")
        .add_header("authorization", harness.auth_header(user))
        .json(&json!({ "amount": 10.0, "accountId": account.to_string() }))
        .await
        .json();
    body["withdrawal"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn pending_withdrawals_are_listed_and_approved() {
    let harness = manual_harness();
    let bob = harness.create_user("bob", Role::User);
    let id = pending_withdrawal(&harness, &bob).await;

    let pending: Value = harness
        .server
        .get("/v1/admin/withdrawals")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .await
        .json();
    assert_eq!(pending["withdrawals"].as_array().unwrap().len(), 1);
    assert_eq!(pending["withdrawals"][0]["id"], id.as_str());

    let response = harness
        .server
        .post(&format!("/v1/admin/withdrawals/{id}/approve"))
        .add_header("x-admin-key", ADMIN_API_KEY)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["withdrawal"]["status"], "processing");
    assert_eq!(harness.channel.submissions().len(), 1);

    // Approving again is not a valid transition.
    harness
        .server
        .post(&format!("/v1/admin/withdrawals/{id}/approve"))
        .add_header("x-admin-key", ADMIN_API_KEY)
        .await
        .assert_status(StatusCode::CONFLICT);
    assert_eq!(harness.channel.submissions().len(), 1);

    let processing: Value = harness
        .server
        .get("/v1/admin/withdrawals")
        .add_query_param("status", "processing")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .await
        .json();
    assert_eq!(processing["withdrawals"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn approval_with_failing_channel_refunds() {
    let harness = manual_harness();
    let bob = harness.create_user("bob", Role::User);
    let id = pending_withdrawal(&harness, &bob).await;
    harness.channel.set_script(PayoutScript::Fail);

    let response = harness
        .server
        .post(&format!("/v1/admin/withdrawals/{id}/approve"))
        .add_header("x-admin-key", ADMIN_API_KEY)
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(harness.earnings(&bob).balance, 155_000);
}

#[tokio::test]
async fn rejection_refunds_once() {
    let harness = manual_harness();
    let bob = harness.create_user("bob", Role::User);
    let id = pending_withdrawal(&harness, &bob).await;
    assert_eq!(harness.earnings(&bob).balance, 0);

    for _ in 0..2 {
        let response = harness
            .server
            .post(&format!("/v1/admin/withdrawals/{id}/reject"))
            .add_header("x-admin-key", ADMIN_API_KEY)
            .json(&json!({ "reason": "name mismatch" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["withdrawal"]["status"], "rejected");
        assert_eq!(body["withdrawal"]["refunded"], true);
    }

    assert_eq!(harness.earnings(&bob).balance, 155_000);
    assert!(harness.channel.submissions().is_empty());
}

#[tokio::test]
async fn processing_withdrawal_cannot_be_rejected() {
    let harness = TestHarness::new();
    let bob = harness.create_user("bob", Role::User);
    let id = pending_withdrawal(&harness, &bob).await;
    assert_eq!(harness.channel.submissions().len(), 1);

    let response = harness
        .server
        .post(&format!("/v1/admin/withdrawals/{id}/reject"))
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({ "reason": "changed my mind" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(harness.earnings(&bob).balance, 0);
}

// ============================================================================
// Service endpoints
// ============================================================================

#[tokio::test]
async fn user_sync_registers_and_renames() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();

    let response = harness
        .server
        .put(&format!("/v1/users/{user_id}"))
        .add_header("x-api-key", SERVICE_API_KEY)
        .add_header("x-service-name", "z-auth")
        .json(&json!({ "username": "Dana", "role": "merchant" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["userId"], user_id.to_string());
    assert_eq!(body["role"], "merchant");
    assert_eq!(body["hasPin"], false);

    harness
        .server
        .put(&format!("/v1/users/{user_id}"))
        .add_header("x-api-key", SERVICE_API_KEY)
        .json(&json!({ "username": "dana2", "role": "merchant" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn user_sync_rejects_taken_username() {
    let harness = TestHarness::new();
    harness.create_user("dana", Role::User);

    let response = harness
        .server
        .put(&format!("/v1/users/{}", UserId::generate()))
        .add_header("x-api-key", SERVICE_API_KEY)
        .json(&json!({ "username": "DANA" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "username_taken");
}

#[tokio::test]
async fn service_charge_debits_balance() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 500);

    let response = harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", SERVICE_API_KEY)
        .add_header("x-service-name", "z-shop")
        .json(&json!({
            "userId": alice.to_string(),
            "amount": 120,
            "kind": "frame_purchase",
            "description": "Golden frame",
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["balance"], 380);
    assert_eq!(harness.balance(&alice), 380);
}

#[tokio::test]
async fn service_charge_rejects_other_kinds_and_bad_keys() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 500);

    harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", SERVICE_API_KEY)
        .json(&json!({ "userId": alice.to_string(), "amount": 120, "kind": "transfer" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", ADMIN_API_KEY)
        .json(&json!({ "userId": alice.to_string(), "amount": 120, "kind": "frame_purchase" }))
        .await
        .assert_status_unauthorized();

    assert_eq!(harness.balance(&alice), 500);
}

// ============================================================================
// Audit
// ============================================================================

#[tokio::test]
async fn failed_operations_are_audited_too() {
    let harness = TestHarness::new();
    let alice = harness.create_user("alice", Role::User);

    harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .add_header("x-admin-id", "ops-7")
        .json(&json!({ "userId": alice.to_string(), "amount": -5, "reason": "typo" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Audit writes happen in the background.
    let mut entries = Vec::new();
    for _ in 0..50 {
        let body: Value = harness
            .server
            .get("/v1/admin/audit")
            .add_header("x-admin-key", ADMIN_API_KEY)
            .await
            .json();
        entries = body["entries"].as_array().cloned().unwrap_or_default();
        if !entries.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let entry = entries
        .iter()
        .find(|e| e["action"] == "admin.credits")
        .expect("audit entry for the failed grant");
    assert_eq!(entry["actor"], "ops-7");
    assert!(entry["error"].is_string());
}
