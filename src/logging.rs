use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber. Safe to call more than
/// once (e.g. from multiple test harnesses); later calls are no-ops.
///
/// Honors `RUST_LOG`, defaulting to `info` for this crate and `warn`
/// elsewhere, in the style of the agent-framework examples in the pack.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,world_server=debug"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
