//! `spicecart-auth`: admin authentication and authorization.
//!
//! Decoupled from HTTP: the API crate extracts the bearer token and calls into
//! the validator and the permission policy defined here.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::{permissions_for_roles, Permission};
pub use principal::{Principal, PrincipalId};
pub use roles::Role;
