use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter when `RUST_LOG` is unset. Command reports go to stdout,
/// so only warnings reach stderr unless asked for.
pub const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber, writing to stderr. Calling it twice is
/// harmless; the second call is ignored.
pub fn init(verbose: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "info" } else { DEFAULT_FILTER })
    });

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}
