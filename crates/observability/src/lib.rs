//! Tracing and logging (shared setup).

pub mod tracing;

pub use crate::tracing::{LogConfig, LogFormat, UnknownLogFormat};

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LogConfig) {
    crate::tracing::init(config);
}
