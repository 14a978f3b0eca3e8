//! Process-wide tracing setup.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, ParseLogFormatError};

/// Initialize tracing in the given format.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
