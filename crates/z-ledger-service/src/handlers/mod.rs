//! API handlers.

// Allow precision loss in handlers - amounts displayed are well within f64 precision
#![allow(clippy::cast_precision_loss)]

pub mod admin;
pub mod calls;
pub mod charges;
pub mod credits;
pub mod earnings;
pub mod gifts;
pub mod health;
pub mod linked_accounts;
pub mod users;
pub mod webhooks;
pub mod withdrawals;

/// Parse a path or body identifier, mapping failures to `invalid_input`.
pub(crate) fn parse_id<T>(value: &str) -> Result<T, crate::error::ApiError>
where
    T: std::str::FromStr<Err = z_ledger_core::IdError>,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| z_ledger_core::LedgerError::from(e).into())
}
