//! Gift purchase integration tests.

mod common;

use axum::http::StatusCode;
use common::{TestHarness, ADMIN_API_KEY};
use serde_json::{json, Value};

use z_ledger_core::{private_chat_id, Role};

#[tokio::test]
async fn check_balance_previews_split() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 100);
    let rose = harness.create_gift("Rose", 150);

    let response = harness
        .server
        .post("/v1/gifts/check-balance")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "giftId": rose.to_string() }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["price"], 150);
    assert_eq!(body["balance"], 100);
    assert_eq!(body["canAfford"], false);
    assert_eq!(body["userShare"], 45);
    assert_eq!(body["systemShare"], 105);
}

#[tokio::test]
async fn purchase_charges_catalog_price_and_splits() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 200);
    let bob = harness.create_user("bob", Role::User);
    let rose = harness.create_gift("Rose", 150);

    // The client-sent price is ignored.
    let response = harness
        .server
        .post("/v1/gifts/purchase")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({
            "giftId": rose.to_string(),
            "recipientUserId": bob.to_string(),
            "price": 1,
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["transaction"]["kind"], "gift");
    assert_eq!(body["transaction"]["amount"], 150);
    assert_eq!(body["earning"]["userShare"], 45);
    assert_eq!(body["earning"]["systemShare"], 105);
    assert_eq!(body["balances"]["sender"], 50);
    assert_eq!(body["balances"]["recipientEarnings"], 45);

    assert_eq!(harness.balance(&alice), 50);
    let earnings = harness.earnings(&bob);
    assert_eq!(earnings.balance, 45);
    assert_eq!(earnings.total_earned, 45);

    let received = harness
        .server
        .get("/v1/earnings/gifts")
        .add_header("authorization", harness.auth_header(&bob))
        .await;
    received.assert_status_ok();
    let received: Value = received.json();
    assert_eq!(received["earnings"].as_array().unwrap().len(), 1);
    assert_eq!(received["earnings"][0]["senderUsername"], "alice");
}

#[tokio::test]
async fn purchase_in_matching_private_chat_succeeds() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 200);
    let bob = harness.create_user("bob", Role::User);
    let rose = harness.create_gift("Rose", 100);

    let response = harness
        .server
        .post("/v1/gifts/purchase")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({
            "giftId": rose.to_string(),
            "recipientUserId": bob.to_string(),
            "roomId": private_chat_id(alice, bob),
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["earning"]["isPrivate"], true);
}

#[tokio::test]
async fn purchase_with_spoofed_private_chat_is_rejected() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 200);
    let bob = harness.create_user("bob", Role::User);
    let carol = harness.create_user("carol", Role::User);
    let rose = harness.create_gift("Rose", 100);

    let response = harness
        .server
        .post("/v1/gifts/purchase")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({
            "giftId": rose.to_string(),
            "recipientUserId": bob.to_string(),
            "roomId": private_chat_id(alice, carol),
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "room_membership_mismatch");
    assert_eq!(harness.balance(&alice), 200);
    assert_eq!(harness.earnings(&bob).balance, 0);
}

#[tokio::test]
async fn purchase_in_public_room_requires_registration() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 500);
    let bob = harness.create_user("bob", Role::User);
    let rose = harness.create_gift("Rose", 100);
    let purchase = json!({
        "giftId": rose.to_string(),
        "recipientUserId": bob.to_string(),
        "roomId": "lobby",
    });

    harness
        .server
        .post("/v1/gifts/purchase")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&purchase)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .server
        .put("/v1/admin/rooms/lobby")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({ "name": "Lobby" }))
        .await
        .assert_status_ok();

    harness
        .server
        .post("/v1/gifts/purchase")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&purchase)
        .await
        .assert_status_ok();
    assert_eq!(harness.balance(&alice), 400);
}

#[tokio::test]
async fn self_gift_is_rejected() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 200);
    let rose = harness.create_gift("Rose", 100);

    let response = harness
        .server
        .post("/v1/gifts/purchase")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "giftId": rose.to_string(), "recipientUserId": alice.to_string() }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_recipient");
}

#[tokio::test]
async fn unaffordable_gift_changes_nothing() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 100);
    let bob = harness.create_user("bob", Role::User);
    let rose = harness.create_gift("Rose", 150);

    let response = harness
        .server
        .post("/v1/gifts/purchase")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "giftId": rose.to_string(), "recipientUserId": bob.to_string() }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_balance");
    assert_eq!(harness.balance(&alice), 100);
    assert_eq!(harness.earnings(&bob).balance, 0);
}

#[tokio::test]
async fn unknown_gift_is_not_found() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 100);
    let bob = harness.create_user("bob", Role::User);

    let response = harness
        .server
        .post("/v1/gifts/purchase")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({
            "giftId": z_ledger_core::GiftId::generate().to_string(),
            "recipientUserId": bob.to_string(),
        }))
        .await;

    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "gift_not_found");
}
