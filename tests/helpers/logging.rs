use tracing_subscriber::{fmt, EnvFilter};

/// Route library logs to the test output; RUST_LOG=debug shows adapter propagation.
pub fn init_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
