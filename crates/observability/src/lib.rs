//! Tracing setup shared by binaries and tests embedding the command core.

/// Initialize process-wide structured logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let _ = tracing::init(tracing::DEFAULT_FILTER);
}

/// Subscriber configuration (filter, JSON formatting).
pub mod tracing;

/// [`init`] for test binaries: output goes through the test harness capture.
pub fn init_test() {
    let _ = tracing::init_test("debug");
}
