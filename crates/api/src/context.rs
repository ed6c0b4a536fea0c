use spicecart_auth::{Principal, PrincipalId, Role};

/// Principal context for an admin request (authenticated identity + roles).
///
/// Inserted into request extensions by the auth middleware; storefront routes
/// never see one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Resolve the roles into a principal with permissions.
    pub fn principal(&self) -> Principal {
        Principal::from_roles(self.principal_id, self.roles.clone())
    }
}
