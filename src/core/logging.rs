//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// cavern::core::logging::init();
/// log::info!("Terrain ready");
/// ```
pub fn init() {
    // try_init: tests and the binary may both call this
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
