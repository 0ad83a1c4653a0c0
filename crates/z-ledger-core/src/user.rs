//! User directory entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};
use crate::UserId;

/// Number of digits in a transfer PIN.
pub const PIN_LENGTH: usize = 6;

/// Maximum username length.
pub const MAX_USERNAME_LEN: usize = 64;

/// Platform role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular user.
    #[default]
    User,
    /// Mentor: sells coins to merchants.
    Mentor,
    /// Merchant: resells coins to users.
    Merchant,
    /// Platform administrator.
    Admin,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Mentor => "mentor",
            Self::Merchant => "merchant",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "mentor" => Ok(Self::Mentor),
            "merchant" => Ok(Self::Merchant),
            "admin" => Ok(Self::Admin),
            other => Err(LedgerError::InvalidInput(format!("unknown role: {other}"))),
        }
    }
}

/// A user as the ledger knows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id.
    pub user_id: UserId,
    /// Unique username (case-insensitive).
    pub username: String,
    /// Platform role.
    pub role: Role,
    /// Keyed hash of the transfer PIN, hex encoded.
    pub pin_hash: Option<String>,
    /// When the profile was first synced.
    pub created_at: DateTime<Utc>,
    /// When the profile last changed.
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Create a profile without a PIN.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid username.
    pub fn new(user_id: UserId, username: impl Into<String>, role: Role) -> Result<Self> {
        let username = username.into();
        validate_username(&username)?;
        let now = Utc::now();
        Ok(Self {
            user_id,
            username,
            role,
            pin_hash: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Lookup key of the username.
    #[must_use]
    pub fn username_key(&self) -> String {
        normalize_username(&self.username)
    }
}

/// Case-folded username used for uniqueness and lookup.
#[must_use]
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Validate a username.
///
/// # Errors
///
/// Returns `InvalidInput` if blank, too long or containing whitespace.
pub fn validate_username(username: &str) -> Result<()> {
    let trimmed = username.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_USERNAME_LEN || trimmed.contains(char::is_whitespace) {
        return Err(LedgerError::InvalidInput(format!("invalid username: {username:?}")));
    }
    Ok(())
}

/// Check that a PIN is exactly six ASCII digits.
///
/// # Errors
///
/// Returns `InvalidPin` otherwise.
pub fn validate_pin_format(pin: &str) -> Result<()> {
    if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(LedgerError::InvalidPin)
    }
}
