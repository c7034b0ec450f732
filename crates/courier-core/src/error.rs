//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur while classifying a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Neither `user_id` nor `delivery_id` carried a value
    #[error("connection supplied neither user_id nor delivery_id")]
    MissingIdentifier,

    /// Peer identifiers must not be empty
    #[error("peer identifier must not be empty")]
    EmptyPeerId,

    /// The `role` parameter named something other than user/delivery
    #[error("unknown role: {value} (expected 'user' or 'delivery')")]
    UnknownRole { value: String },

    /// An explicit role was requested but its identifier is missing
    #[error("role {role} requested but {param} is empty")]
    RoleWithoutIdentifier { role: String, param: &'static str },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        assert_eq!(
            DomainError::MissingIdentifier.to_string(),
            "connection supplied neither user_id nor delivery_id"
        );

        let err = DomainError::UnknownRole {
            value: "courier".to_string(),
        };
        assert!(err.to_string().contains("courier"));

        let err = DomainError::RoleWithoutIdentifier {
            role: "user".to_string(),
            param: "user_id",
        };
        assert_eq!(err.to_string(), "role user requested but user_id is empty");
    }
}
