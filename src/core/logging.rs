//! Tracing setup for engine hosts

/// Initialize tracing for a process embedding the engine
///
/// Respects `RUST_LOG` when set; otherwise logs the engine at info level.
/// Safe to call more than once (later calls are no-ops).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("draftplan=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
