use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Installs the process-wide log backend. `log` records are forwarded to the
/// fmt subscriber; `RUST_LOG` overrides `default_filter`.
pub fn init(default_filter: &str) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        if let Err(err) = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
        {
            eprintln!("failed to initialize logging: {err}");
        }
    });
}
