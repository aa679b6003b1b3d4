use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Env;

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "photo_visibility=debug,sqlx=warn";

/// init_tracing
///
/// Installs the global tracing subscriber for the process. The log level
/// comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
///
/// * `Env::Local`: pretty, human-readable output.
/// * `Env::Production`: one JSON object per line, for log aggregators.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(env: &Env) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}
