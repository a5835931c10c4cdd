use tracing_subscriber::{prelude::*, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber, filtered by `RUST_LOG` and logging at
/// `info` by default. Records of the `log` facade, which the tracer uses, are
/// forwarded to it. Does nothing if a subscriber is already installed.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_filter(filter),
        )
        .try_init();
}
