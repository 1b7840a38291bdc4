//! Value Objects for domain models.
//!
//! Value Objects are immutable objects that represent values in the domain.
//! They are compared by their value, not by identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

use super::error::ValueObjectError;

/// User identifier value object.
///
/// Carried by every authenticated connection; comes from the token claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId.
    ///
    /// # Arguments
    ///
    /// * `id` - The user identifier string
    ///
    /// # Returns
    ///
    /// A Result containing the UserId or an error if validation fails
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        if id.is_empty() {
            return Err(ValueObjectError::UserIdEmpty);
        }
        let len = id.len();
        if len > 100 {
            return Err(ValueObjectError::UserIdTooLong {
                max: 100,
                actual: len,
            });
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display name value object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Create a new Username.
    pub fn new(name: String) -> Result<Self, ValueObjectError> {
        if name.is_empty() {
            return Err(ValueObjectError::UsernameEmpty);
        }
        let len = name.len();
        if len > 100 {
            return Err(ValueObjectError::UsernameTooLong {
                max: 100,
                actual: len,
            });
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const ROOM_ID_MIN_LEN: usize = 6;
const ROOM_ID_MAX_LEN: usize = 32;

/// Room identifier value object.
///
/// Upper-case alphanumerics, at least six characters. Client-supplied
/// ids go through [`RoomId::parse`], which trims and upper-cases before
/// validating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Create a new RoomId from an already-normalized string.
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        let len = id.len();
        if len < ROOM_ID_MIN_LEN {
            return Err(ValueObjectError::RoomIdTooShort {
                min: ROOM_ID_MIN_LEN,
                actual: len,
            });
        }
        if len > ROOM_ID_MAX_LEN {
            return Err(ValueObjectError::RoomIdTooLong {
                max: ROOM_ID_MAX_LEN,
                actual: len,
            });
        }
        if !id.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(ValueObjectError::RoomIdInvalidChar(id));
        }
        Ok(Self(id))
    }

    /// Normalize raw client input (trim, upper-case) and validate.
    pub fn parse(input: &str) -> Result<Self, ValueObjectError> {
        Self::new(input.trim().to_ascii_uppercase())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Factory for generated room ids.
pub struct RoomIdFactory;

impl RoomIdFactory {
    /// Generate a fresh 8-character room id from a UUID v4 prefix.
    pub fn generate() -> Result<RoomId, ValueObjectError> {
        let hex = Uuid::new_v4().simple().to_string();
        RoomId::new(hex[..8].to_ascii_uppercase())
    }
}
