//! Z-Ledger HTTP API Service.
//!
//! This crate provides the HTTP API for the virtual currency ledger:
//!
//! - Spendable balances, transfers and transfer PINs
//! - Gift purchases and paid call billing
//! - Earnings, linked payout accounts and withdrawals
//! - Payout provider callbacks
//! - Admin grants, catalog management and withdrawal operations
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **HS256 JWT tokens** - For end-user requests
//! 2. **Service API keys** - For platform services (user sync, direct charges)
//! 3. **Admin API keys** - For the operations console
//!
//! # Withdrawals
//!
//! Earnings are reserved in the store first; the payout channel is called
//! afterwards with no store transaction open. See [`dispatch`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router even when they never await

pub mod audit;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod payout;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use config::{PayoutMode, ServiceConfig};
pub use error::ApiError;
pub use payout::{HttpPayoutChannel, PayoutChannel, PayoutError, PayoutReceipt, PayoutRequest};
pub use routes::create_router;
pub use state::AppState;
