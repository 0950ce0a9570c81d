//! Log output for the adcheck binary.
//!
//! All log lines go to stderr: stdout is reserved for command output such
//! as the YAML printed by `dump-tasks`.

use std::io;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. With `json` every line is a JSON
/// object carrying the reporter's `unit` and `severity` fields. Worker
/// thread names are kept so interleaved rounds can be told apart.
///
/// Only the first call in a process has an effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let output: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_thread_names(true)
            .with_target(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(io::stderr)
            .with_thread_names(true)
            .with_target(false)
            .boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init();
}
