//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    admin, calls, charges, credits, earnings, gifts, health, linked_accounts, users, webhooks,
    withdrawals,
};
use crate::state::AppState;

/// Maximum concurrent requests for user-facing endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for service and admin endpoints.
const INTERNAL_MAX_CONCURRENT_REQUESTS: usize = 25;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/withdrawals/exchange-rate` - Conversion rules
///
/// ## User (JWT auth)
/// - `GET /v1/credits/balance`, `GET /v1/credits/transactions`
/// - `POST /v1/credits/transfer`, `PUT /v1/credits/pin`, `GET /v1/credits/topup-progress`
/// - `POST /v1/gifts/check-balance`, `POST /v1/gifts/purchase`
/// - `POST /v1/calls/:call_id/charge`, `POST /v1/calls/:call_id/finalize`
/// - `GET /v1/earnings/balance`, `GET /v1/earnings/gifts`
/// - `POST /v1/withdrawals`, `GET /v1/withdrawals/history`
/// - `GET|POST /v1/linked-accounts`, `DELETE /v1/linked-accounts/:id`
///
/// ## Service (API key auth)
/// - `PUT /v1/users/:user_id` - Directory sync
/// - `POST /v1/charges` - Direct spendable charge
///
/// ## Admin (admin key auth)
/// - `POST /v1/admin/credits`, `PUT /v1/admin/gifts`, `PUT /v1/admin/rooms/:room_id`
/// - `GET /v1/admin/withdrawals`, `GET /v1/admin/withdrawals/reconciliation`
/// - `POST /v1/admin/withdrawals/:id/approve`, `POST /v1/admin/withdrawals/:id/reject`
/// - `GET /v1/admin/audit`
///
/// ## Webhooks (callback token)
/// - `POST /webhooks/payout` - Payout status callbacks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let internal_routes = Router::new()
        .route("/users/:user_id", put(users::sync_user))
        .route("/charges", post(charges::create_charge))
        .route("/admin/credits", post(admin::grant_credits))
        .route("/admin/gifts", put(admin::upsert_gift))
        .route("/admin/rooms/:room_id", put(admin::register_room))
        .route("/admin/withdrawals", get(admin::list_withdrawals))
        .route(
            "/admin/withdrawals/reconciliation",
            get(admin::list_reconciliation),
        )
        .route(
            "/admin/withdrawals/:id/approve",
            post(admin::approve_withdrawal),
        )
        .route(
            "/admin/withdrawals/:id/reject",
            post(admin::reject_withdrawal),
        )
        .route("/admin/audit", get(admin::list_audit))
        .layer(ConcurrencyLimitLayer::new(INTERNAL_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/credits/transfer", post(credits::transfer))
        .route("/credits/pin", put(credits::set_pin))
        .route("/credits/topup-progress", get(credits::topup_progress))
        // Gifts
        .route("/gifts/check-balance", post(gifts::check_balance))
        .route("/gifts/purchase", post(gifts::purchase))
        // Calls
        .route("/calls/:call_id/charge", post(calls::charge))
        .route("/calls/:call_id/finalize", post(calls::finalize))
        // Earnings
        .route("/earnings/balance", get(earnings::get_balance))
        .route("/earnings/gifts", get(earnings::list_gift_earnings))
        // Withdrawals
        .route("/withdrawals", post(withdrawals::create))
        .route("/withdrawals/exchange-rate", get(withdrawals::exchange_rate))
        .route("/withdrawals/history", get(withdrawals::history))
        // Linked accounts
        .route(
            "/linked-accounts",
            get(linked_accounts::list).post(linked_accounts::create),
        )
        .route("/linked-accounts/:id", delete(linked_accounts::delete))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .merge(internal_routes);

    Router::new()
        // Health (public, no concurrency limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Webhooks (controlled by the payout provider)
        .route("/webhooks/payout", post(webhooks::payout_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
