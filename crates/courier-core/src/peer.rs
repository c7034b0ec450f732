//! Peer identities and roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identifier a peer registers under.
///
/// Opaque to the relay: users and delivery agents share one namespace and
/// the registry keys on the string value alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Creates a peer identifier, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::EmptyPeerId);
        }
        Ok(Self(id))
    }

    /// Creates a peer identifier from an optional query value.
    ///
    /// Missing and empty values both map to `None`.
    pub fn from_param(value: Option<&str>) -> Option<Self> {
        value.filter(|v| !v.is_empty()).map(|v| Self(v.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Process-unique number assigned to each accepted connection.
///
/// Two connections registered under the same `PeerId` are told apart by
/// this value, which is what guarded removal compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Which side of a user/delivery pairing a connection speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Delivery,
}

impl Role {
    /// Lowercase wire name, as accepted by the `role` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Delivery => "delivery",
        }
    }

    /// Query parameter carrying this role's own identifier.
    pub fn id_param(self) -> &'static str {
        match self {
            Self::User => "user_id",
            Self::Delivery => "delivery_id",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "delivery" | "delivery_agent" | "agent" => Ok(Self::Delivery),
            _ => Err(DomainError::UnknownRole {
                value: s.to_string(),
            }),
        }
    }
}
