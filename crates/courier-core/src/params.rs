//! Connection parameters and the classification of a connection into a role.
//!
//! A peer announces itself through the query string of the upgrade request:
//!
//! ```text
//! /ws?user_id=u1                       user u1, no counterpart yet
//! /ws?delivery_id=d1&user_id=u1        delivery agent d1 serving u1
//! /ws?user_id=u1&delivery_id=d1        same as above (delivery wins)
//! /ws?user_id=u1&delivery_id=d1&role=user   user u1 talking to d1
//! ```

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult, PeerId, Role};

/// Raw query parameters of an upgrade request.
///
/// Every field is optional on the wire; `classify` decides whether the
/// combination is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub delivery_id: Option<String>,

    /// Explicit role, used to disambiguate when both identifiers are given.
    #[serde(default)]
    pub role: Option<String>,
}

/// A classified connection: who it is and who it forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub role: Role,

    /// Identifier the connection registers under
    pub peer_id: PeerId,

    /// Identifier inbound frames are forwarded to, if one was supplied
    pub counterpart: Option<PeerId>,
}

impl ConnectParams {
    pub fn new(user_id: Option<&str>, delivery_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            delivery_id: delivery_id.map(str::to_string),
            role: None,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role.as_str().to_string());
        self
    }

    /// Classifies the connection.
    ///
    /// Without an explicit `role`, a non-empty `delivery_id` makes the
    /// connection a delivery agent forwarding to `user_id`; otherwise a
    /// non-empty `user_id` makes it a user forwarding to `delivery_id`.
    ///
    /// # Errors
    ///
    /// - `DomainError::MissingIdentifier` if both identifiers are empty
    /// - `DomainError::UnknownRole` if `role` is not user/delivery
    /// - `DomainError::RoleWithoutIdentifier` if the requested role's own
    ///   identifier is empty
    pub fn classify(&self) -> DomainResult<Identity> {
        let user = PeerId::from_param(self.user_id.as_deref());
        let delivery = PeerId::from_param(self.delivery_id.as_deref());

        if user.is_none() && delivery.is_none() {
            return Err(DomainError::MissingIdentifier);
        }

        let role = match self.role.as_deref().filter(|r| !r.is_empty()) {
            Some(raw) => raw.parse::<Role>()?,
            None if delivery.is_some() => Role::Delivery,
            None => Role::User,
        };

        let (own, counterpart) = match role {
            Role::Delivery => (delivery, user),
            Role::User => (user, delivery),
        };

        let peer_id = own.ok_or_else(|| DomainError::RoleWithoutIdentifier {
            role: role.to_string(),
            param: role.id_param(),
        })?;

        Ok(Identity {
            role,
            peer_id,
            counterpart,
        })
    }
}
