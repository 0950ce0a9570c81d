//! adcheck core library
//!
//! Shared building blocks for validating an attack/defense game repository:
//! - [`reporter`]: fail-fast reporting shared by all workers
//! - [`target`]: service discovery and compose runtime control
//! - [`structure`]: structural validation of service directories
//! - [`config`]: harness settings and worker pool sizing

pub mod config;
pub mod error;
pub mod reporter;
pub mod structure;
pub mod target;
pub mod telemetry;

pub use config::{pool_size, HarnessConfig};
pub use error::{CoreError, Fatal, Result};
pub use reporter::{FailFastReporter, Finding, Severity, UnitReporter, ValidationOutcome};
pub use structure::{classify, ContainerRole, DependencyGraph, StructureValidator};
pub use target::{Target, CHECKER_FILE, SELECT_ALL};
pub use telemetry::init_tracing;
