//! Logging initialization

/// Initialize the logging system with environment-based configuration
pub fn init() {
    env_logger::init();
}

/// Initialize logging for tests (ignores repeat initialization)
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
