//! Payout channel abstraction.
//!
//! The provider is an external collaborator: the withdrawal flow only sees
//! [`PayoutChannel`]. [`HttpPayoutChannel`] talks to a disbursement API over
//! HTTP; tests substitute scripted channels.

mod http;

pub use http::HttpPayoutChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use z_ledger_core::{AccountType, PayoutDestination, WithdrawalRequest};

/// Banks the provider can pay out to.
pub const SUPPORTED_BANKS: &[&str] = &["BCA", "MANDIRI", "BNI", "BRI", "CIMB", "PERMATA"];

/// E-wallets the provider can pay out to.
pub const SUPPORTED_EWALLETS: &[&str] = &["GOPAY", "OVO", "DANA", "LINKAJA", "SHOPEEPAY"];

/// Error type for payout operations.
#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    /// Destination provider not served by the channel.
    #[error("unsupported {kind} provider: {provider}")]
    UnsupportedProvider {
        /// Bank or e-wallet.
        kind: AccountType,
        /// Provider code.
        provider: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the payout.
    #[error("provider rejected payout ({status}): {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Provider error message.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// One payout submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutRequest {
    /// Stable across retries of the same withdrawal.
    pub idempotency_key: String,
    /// `WD-{withdrawal id}`, echoed back in callbacks.
    pub reference_id: String,
    /// Where the money goes.
    pub destination: PayoutDestination,
    /// Net amount.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Free-text description.
    pub description: String,
}

impl PayoutRequest {
    /// Build the submission for a reserved withdrawal.
    #[must_use]
    pub fn for_withdrawal(withdrawal: &WithdrawalRequest, currency: &str) -> Self {
        Self {
            idempotency_key: withdrawal.idempotency_key(),
            reference_id: withdrawal.reference_id(),
            destination: withdrawal.destination.clone(),
            amount: withdrawal.net_amount,
            currency: currency.to_string(),
            description: format!("Withdrawal for user {}", withdrawal.user_id),
        }
    }
}

/// What the channel answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    /// Provider payout id.
    #[serde(rename = "id")]
    pub payout_id: String,
    /// Provider status, e.g. `ACCEPTED`.
    pub status: String,
}

/// An external payout channel.
#[async_trait]
pub trait PayoutChannel: Send + Sync {
    /// Submit a payout. Must be safe to repeat with the same idempotency key.
    async fn submit(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError>;
}

/// Provider channel code for a destination, e.g. `ID_BCA`.
///
/// # Errors
///
/// Returns `UnsupportedProvider` for providers outside the supported lists.
pub fn channel_code(destination: &PayoutDestination) -> Result<String, PayoutError> {
    let provider = destination.provider.trim().to_ascii_uppercase();
    let supported = match destination.account_type {
        AccountType::Bank => SUPPORTED_BANKS,
        AccountType::Ewallet => SUPPORTED_EWALLETS,
    };
    if supported.contains(&provider.as_str()) {
        Ok(format!("ID_{provider}"))
    } else {
        Err(PayoutError::UnsupportedProvider {
            kind: destination.account_type,
            provider,
        })
    }
}
