//! Error taxonomy for adcheck.
//!
//! Two families live here:
//! - [`Fatal`]: a contract violation that aborts the current unit of work
//!   (one round, one file, one command). Produced only by
//!   [`crate::reporter::FailFastReporter::fatal`], after the message has
//!   been logged and the fail-fast latch tripped.
//! - [`CoreError`]: infrastructure failures (I/O, YAML, the compose runtime)
//!   that are not part of the validation verdict itself.

/// A fatal contract violation.
///
/// The message has already been reported by the time this value exists;
/// callers only need to propagate it with `?`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{unit}: {message}")]
pub struct Fatal {
    /// Unit of work that raised the violation, e.g. `checker example`.
    pub unit: String,
    /// Human-readable description of the violation.
    pub message: String,
}

/// Infrastructure errors produced by the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("runtime command `{command}` failed: {reason}")]
    Runtime { command: String, reason: String },

    #[error(transparent)]
    Fatal(#[from] Fatal),
}

impl CoreError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
