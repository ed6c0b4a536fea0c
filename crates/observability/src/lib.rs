//! Process-wide tracing setup.

pub mod subscriber;

pub use subscriber::LogFormat;

/// Initialise tracing from `RUST_LOG` and `LOG_FORMAT`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .map(|raw| LogFormat::parse(&raw))
        .unwrap_or_default();
    subscriber::init(format);
}
