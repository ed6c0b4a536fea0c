//! Customers domain module (event-sourced).
//!
//! A customer is identified by a normalised Indian mobile number and carries the
//! contact details and delivery address used when placing orders.

pub mod contact;
pub mod customer;

pub use contact::{normalize_email, normalize_phone, DeliveryAddress};
pub use customer::{
    Customer, CustomerCommand, CustomerContactUpdated, CustomerEvent, CustomerId,
    CustomerRegistered, RegisterCustomer, UpdateContact,
};

/// Aggregate type name recorded in the event store for customer streams.
pub const AGGREGATE_TYPE: &str = "customers.customer";
