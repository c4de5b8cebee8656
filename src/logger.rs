use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the stdout subscriber. `RUST_LOG` overrides the default `info` level.
///
/// Uses `try_init` so embedders that already installed a subscriber keep theirs.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true)
                .with_ansi(true),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if !installed {
        tracing::debug!("Global subscriber already set, keeping existing one");
    }
}
