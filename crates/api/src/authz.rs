//! API-side authorization guard.
//!
//! Enforced at the handler boundary (before dispatch), keeping aggregates and
//! infra auth-agnostic.

use axum::http::StatusCode;

use spicecart_auth::{authorize, AuthzError, Permission};

use crate::app::errors;
use crate::context::PrincipalContext;

pub fn check(principal: &PrincipalContext, permission: &Permission) -> Result<(), AuthzError> {
    authorize(&principal.principal(), permission)
}

/// `check`, mapped to the 403 envelope.
pub fn require(
    principal: &PrincipalContext,
    permission: &Permission,
) -> Result<(), axum::response::Response> {
    check(principal, permission).map_err(|e| {
        tracing::warn!(
            principal_id = %principal.principal_id(),
            permission = permission.as_str(),
            "permission denied"
        );
        errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spicecart_auth::{PrincipalId, Role};

    #[test]
    fn staff_may_update_order_status_but_not_prices() {
        let staff = PrincipalContext::new(PrincipalId::new(), vec![Role::STAFF]);
        assert!(check(&staff, &Permission::ORDERS_UPDATE_STATUS).is_ok());
        assert!(check(&staff, &Permission::PRODUCTS_UPDATE).is_err());
    }

    #[test]
    fn denial_maps_to_forbidden() {
        let nobody = PrincipalContext::new(PrincipalId::new(), vec![]);
        let response = require(&nobody, &Permission::ORDERS_READ).unwrap_err();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
