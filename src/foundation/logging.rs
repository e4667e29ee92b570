//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system.
///
/// Call once at startup (or from a test harness). Subsequent calls are
/// ignored rather than panicking, so tests can each call it freely.
pub fn init() {
    let _ = env_logger::builder().is_test(false).try_init();
}
