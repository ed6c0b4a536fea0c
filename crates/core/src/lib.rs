//! `spicecart-core`: domain building blocks shared by every storefront crate.
//!
//! Nothing in here performs IO: identifiers, the aggregate contract, the domain
//! error model and the `Money` value type.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::AggregateId;
pub use money::{Money, ValueObject};
