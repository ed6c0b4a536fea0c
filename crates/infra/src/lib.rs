//! Infrastructure layer: event storage, command dispatch, read models and
//! configuration.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use config::{AppConfig, ConfigError, GatewayKind, PaymentsConfig, Persistence};
pub use projections::ReadModels;
