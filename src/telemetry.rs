//! Tracing subscriber setup for the `corecpi` binary.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
///
/// Output goes to stderr so stdout stays clean for tables and plots. Calling
/// this more than once is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
        tracing::info!("still alive");
    }
}
