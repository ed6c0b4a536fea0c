use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier, e.g. `"orders.update_status"`.
///
/// `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const PRODUCTS_READ: Permission = Permission(Cow::Borrowed("products.read"));
    pub const PRODUCTS_CREATE: Permission = Permission(Cow::Borrowed("products.create"));
    pub const PRODUCTS_UPDATE: Permission = Permission(Cow::Borrowed("products.update"));
    pub const PRODUCTS_PUBLISH: Permission = Permission(Cow::Borrowed("products.publish"));
    pub const ORDERS_READ: Permission = Permission(Cow::Borrowed("orders.read"));
    pub const ORDERS_UPDATE_STATUS: Permission = Permission(Cow::Borrowed("orders.update_status"));
    pub const CUSTOMERS_READ: Permission = Permission(Cow::Borrowed("customers.read"));
    /// Operational; only the `admin` wildcard grants it.
    pub const READ_MODELS_REBUILD: Permission = Permission(Cow::Borrowed("read_models.rebuild"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storefront role policy. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut perms: Vec<Permission> = Vec::new();
    for role in roles {
        match role.as_str() {
            "admin" => perms.push(Permission::WILDCARD),
            "staff" => perms.extend([
                Permission::PRODUCTS_READ,
                Permission::ORDERS_READ,
                Permission::ORDERS_UPDATE_STATUS,
                Permission::CUSTOMERS_READ,
            ]),
            _ => {}
        }
    }
    perms.sort();
    perms.dedup();
    perms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_wildcard() {
        assert_eq!(permissions_for_roles(&[Role::ADMIN]), vec![Permission::WILDCARD]);
    }

    #[test]
    fn staff_cannot_edit_catalog() {
        let perms = permissions_for_roles(&[Role::STAFF, Role::STAFF]);
        assert!(perms.contains(&Permission::ORDERS_UPDATE_STATUS));
        assert!(!perms.contains(&Permission::PRODUCTS_CREATE));
        assert_eq!(perms.len(), 4);
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        assert!(permissions_for_roles(&[Role::new("viewer")]).is_empty());
    }
}
