use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role carried in admin tokens.
///
/// Opaque at this layer; `permissions_for_roles` turns roles into permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Full access.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    /// Order handling: read everything, move orders through fulfilment.
    pub const STAFF: Role = Role(Cow::Borrowed("staff"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
