pub mod config;
pub mod error;
pub mod rest;
pub mod session;
pub mod ws;

/// Initialize env-filtered logging for the client runtime. Safe to call
/// more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init();
}
