//! Paid call billing integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::{json, Value};

use z_ledger_core::{CallTariff, Role};
use z_ledger_store::Settlement;

/// 100 coins per interval.
fn flat_tariff_harness() -> TestHarness {
    TestHarness::with_config(|config| {
        config.call_tariff = CallTariff {
            first_minute: 300,
            later_minute: 300,
        };
    })
}

#[tokio::test]
async fn intervals_accumulate_then_settle_once() {
    let harness = flat_tariff_harness();
    let alice = harness.create_funded_user("alice", Role::User, 1_000);
    let bob = harness.create_user("bob", Role::User);

    for expected_total in [100, 200, 300] {
        // Client-sent amounts are ignored in favour of the tariff.
        let response = harness
            .server
            .post("/v1/calls/call-1/charge")
            .add_header("authorization", harness.auth_header(&alice))
            .json(&json!({ "receiverId": bob.to_string(), "amount": 1 }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["charged"], 100);
        assert_eq!(body["chargedTotal"], expected_total);
    }
    assert_eq!(harness.balance(&alice), 700);

    let finalize = json!({
        "totalAmount": 300,
        "durationSeconds": 180,
    });
    let response = harness
        .server
        .post("/v1/calls/call-1/finalize")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&finalize)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["grossAmount"], 300);
    assert_eq!(body["userShare"], 90);
    assert_eq!(body["systemShare"], 210);
    assert_eq!(body["receiverEarnings"], 90);
    assert_eq!(body["alreadyFinalized"], false);

    let again = harness
        .server
        .post("/v1/calls/call-1/finalize")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&finalize)
        .await;
    again.assert_status_ok();
    let again: Value = again.json();
    assert_eq!(again["alreadyFinalized"], true);
    assert_eq!(again["userShare"], 90);
    assert_eq!(harness.earnings(&bob).balance, 90);
}

#[tokio::test]
async fn default_tariff_bills_minutes_in_slices() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 10_000);
    let bob = harness.create_user("bob", Role::User);

    let mut charged = Vec::new();
    for _ in 0..6 {
        let body: Value = harness
            .server
            .post("/v1/calls/call-t/charge")
            .add_header("authorization", harness.auth_header(&alice))
            .json(&json!({ "receiverId": bob.to_string() }))
            .await
            .json();
        charged.push(body["charged"].as_i64().unwrap());
    }

    assert_eq!(charged, vec![834, 833, 833, 667, 667, 666]);
    assert_eq!(harness.balance(&alice), 5_500);

    let body: Value = harness
        .server
        .post("/v1/calls/call-t/finalize")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "totalAmount": 4_500, "durationSeconds": 120 }))
        .await
        .json();
    assert_eq!(body["grossAmount"], 4_500);
    assert_eq!(body["userShare"], 1_350);
}

#[tokio::test]
async fn receiver_can_finalize_when_payer_leaves() {
    let harness = flat_tariff_harness();
    let alice = harness.create_funded_user("alice", Role::User, 1_000);
    let bob = harness.create_user("bob", Role::User);

    for _ in 0..2 {
        harness
            .server
            .post("/v1/calls/call-5/charge")
            .add_header("authorization", harness.auth_header(&alice))
            .json(&json!({ "receiverId": bob.to_string() }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .post("/v1/calls/call-5/finalize")
        .add_header("authorization", harness.auth_header(&bob))
        .json(&json!({ "totalAmount": 200, "durationSeconds": 40 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["grossAmount"], 200);
    assert_eq!(body["userShare"], 60);
    assert_eq!(harness.earnings(&bob).balance, 60);
    assert_eq!(harness.balance(&alice), 800);
}

#[tokio::test]
async fn charge_after_finalize_is_rejected() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 1_000);
    let bob = harness.create_user("bob", Role::User);

    harness
        .server
        .post("/v1/calls/call-2/charge")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "receiverId": bob.to_string() }))
        .await
        .assert_status_ok();
    harness
        .server
        .post("/v1/calls/call-2/finalize")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "totalAmount": 100, "durationSeconds": 60 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/v1/calls/call-2/charge")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "receiverId": bob.to_string() }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "call_already_finalized");
}

#[tokio::test]
async fn other_participants_cannot_reuse_a_call() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 1_000);
    let bob = harness.create_user("bob", Role::User);
    let carol = harness.create_funded_user("carol", Role::User, 1_000);

    harness
        .server
        .post("/v1/calls/call-3/charge")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "receiverId": bob.to_string() }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/v1/calls/call-3/finalize")
        .add_header("authorization", harness.auth_header(&carol))
        .json(&json!({ "totalAmount": 100, "durationSeconds": 60 }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "call_session_mismatch");
    assert_eq!(harness.earnings(&bob).balance, 0);
}

#[tokio::test]
async fn finalize_unknown_call_is_not_found() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 1_000);

    let response = harness
        .server
        .post("/v1/calls/never-started/finalize")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "totalAmount": 0, "durationSeconds": 0 }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn charge_without_funds_opens_no_session() {
    let harness = TestHarness::new();
    let alice = harness.create_funded_user("alice", Role::User, 50);
    let bob = harness.create_user("bob", Role::User);

    let response = harness
        .server
        .post("/v1/calls/call-4/charge")
        .add_header("authorization", harness.auth_header(&alice))
        .json(&json!({ "receiverId": bob.to_string() }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.balance(&alice), 50);

    assert!(harness.store.get_call_session("call-4").unwrap().is_none());
}
