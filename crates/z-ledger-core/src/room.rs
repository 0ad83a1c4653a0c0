//! Room context of a gift.
//!
//! Public rooms are registered ids. Private chats are never stored; their id
//! is derived from the two participants as `private_{lower}_{higher}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::UserId;

const PRIVATE_PREFIX: &str = "private_";

/// Where a gift was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RoomContext {
    /// A registered public room.
    Public(String),
    /// A one-to-one private chat.
    Private(String),
}

impl RoomContext {
    /// Classify a client-supplied room id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank ids.
    pub fn parse(room_id: &str) -> Result<Self> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(LedgerError::InvalidInput("room id must not be blank".to_string()));
        }
        if room_id.starts_with(PRIVATE_PREFIX) {
            Ok(Self::Private(room_id.to_string()))
        } else {
            Ok(Self::Public(room_id.to_string()))
        }
    }

    /// Room id as sent by the client.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Public(id) | Self::Private(id) => id,
        }
    }

    /// Is this a private chat?
    #[must_use]
    pub const fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }

    /// For a private chat, check that the id is exactly the pair id of `a` and `b`.
    ///
    /// Public rooms pass; their existence is checked against the registry.
    ///
    /// # Errors
    ///
    /// Returns `RoomMembershipMismatch` when the private id names other participants.
    pub fn ensure_participants(&self, a: UserId, b: UserId) -> Result<()> {
        match self {
            Self::Private(id) if *id != private_chat_id(a, b) => {
                Err(LedgerError::RoomMembershipMismatch { room: id.clone() })
            }
            _ => Ok(()),
        }
    }
}

/// Deterministic private chat id for a pair of users.
#[must_use]
pub fn private_chat_id(a: UserId, b: UserId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{PRIVATE_PREFIX}{low}_{high}")
}

/// A registered public room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// When the room was registered.
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Register a public room.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank ids or ids in the private namespace.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() || id.starts_with(PRIVATE_PREFIX) {
            return Err(LedgerError::InvalidInput(format!("invalid public room id: {id}")));
        }
        Ok(Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
        })
    }
}
