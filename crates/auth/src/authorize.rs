use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: wildcard or exact permission match.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let allowed = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if allowed {
        Ok(())
    } else {
        tracing::debug!(
            principal_id = %principal.principal_id,
            permission = %required,
            "permission denied"
        );
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
