//! Fail-fast reporting shared by every concurrent worker.
//!
//! A single [`FailFastReporter`] exists per process. Workers talk to it
//! through [`UnitReporter`] handles, which tag every line and every
//! counter with the unit of work they belong to (a checker, a service, a
//! structure validator).
//!
//! Three severities with distinct effects:
//!
//! | Call        | Logs at | Counts     | Aborts |
//! |-------------|---------|------------|--------|
//! | `fatal`     | error   | `fatal`    | yes: returns `Err(Fatal)` and trips the latch |
//! | `error`     | error   | `errors`   | no     |
//! | `warning`   | warn    | `warnings` | no     |
//!
//! Once the latch has tripped every further line is suppressed, so workers
//! that are already doomed do not flood the output. The message that trips
//! the latch is always shown, exactly once.
//!
//! One mutex guards the log sink and the per-unit outcomes. The latch is an
//! atomic that is only written while that mutex is held, so hot-path reads
//! (`is_tripped`) never take the lock.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::error::Fatal;

/// Aggregate defect counters for one logical unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub fatal: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl ValidationOutcome {
    /// A unit with a recorded fatal can make no further progress.
    pub fn is_terminal(&self) -> bool {
        self.fatal > 0
    }

    /// No fatal and no error recorded. Warnings do not count.
    pub fn is_clean(&self) -> bool {
        self.fatal == 0 && self.errors == 0
    }

    /// Number of fatals plus errors.
    pub fn defects(&self) -> u32 {
        self.fatal + self.errors
    }
}

/// How serious a reported line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// A warning, error or fatal as it was reported, shown or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub unit: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Default)]
struct ReporterState {
    outcomes: BTreeMap<String, ValidationOutcome>,
    findings: Vec<Finding>,
    emitted: u64,
}

impl ReporterState {
    fn outcome_mut(&mut self, unit: &str) -> &mut ValidationOutcome {
        self.outcomes.entry(unit.to_string()).or_default()
    }

    fn record(&mut self, severity: Severity, unit: &str, message: &str) {
        self.findings.push(Finding {
            unit: unit.to_string(),
            severity,
            message: message.to_string(),
        });
    }

    fn emit(&mut self, severity: Severity, unit: &str, message: &str) {
        self.emitted += 1;
        match severity {
            Severity::Info => info!(unit = %unit, "{message}"),
            Severity::Warning => warn!(unit = %unit, severity = "warning", "{message}"),
            Severity::Error => error!(unit = %unit, severity = "error", "{message}"),
            Severity::Fatal => error!(unit = %unit, severity = "fatal", "{message}"),
        }
    }
}

/// Process-wide reporter with a fail-fast latch.
#[derive(Debug, Default)]
pub struct FailFastReporter {
    state: Mutex<ReporterState>,
    tripped: AtomicBool,
}

impl FailFastReporter {
    /// Create a reporter ready to be shared between workers.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hand out a handle that reports under `unit`.
    pub fn scope(self: &Arc<Self>, unit: impl Into<String>) -> UnitReporter {
        UnitReporter {
            unit: Arc::from(unit.into()),
            reporter: Arc::clone(self),
        }
    }

    /// Whether a fatal has been recorded anywhere in the process.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Snapshot of the counters for `unit`.
    pub fn outcome(&self, unit: &str) -> ValidationOutcome {
        self.lock().outcomes.get(unit).copied().unwrap_or_default()
    }

    /// Snapshot of every unit's counters, ordered by unit name.
    pub fn outcomes(&self) -> BTreeMap<String, ValidationOutcome> {
        self.lock().outcomes.clone()
    }

    /// Every finding reported under `unit`, in order, including the ones
    /// suppressed by the latch.
    pub fn findings(&self, unit: &str) -> Vec<Finding> {
        self.lock()
            .findings
            .iter()
            .filter(|f| f.unit == unit)
            .cloned()
            .collect()
    }

    /// Number of lines actually written to the log sink.
    pub fn emitted_lines(&self) -> u64 {
        self.lock().emitted
    }

    pub fn info(&self, unit: &str, message: impl Display) {
        let mut state = self.lock();
        if !self.is_tripped() {
            state.emit(Severity::Info, unit, &message.to_string());
        }
    }

    /// Abort the current unit of work unless `cond` holds.
    ///
    /// Only the first fatal in the process is logged; later ones are counted
    /// and still returned as `Err` but produce no output.
    pub fn fatal(&self, unit: &str, cond: bool, message: impl Display) -> Result<(), Fatal> {
        if cond {
            Ok(())
        } else {
            Err(self.abort(unit, message))
        }
    }

    /// Record a fatal unconditionally and hand back the value to propagate.
    ///
    /// Convenience for `map_err` on failures that are fatal by nature.
    pub fn abort(&self, unit: &str, message: impl Display) -> Fatal {
        let message = message.to_string();
        let mut state = self.lock();
        if !self.tripped.swap(true, Ordering::AcqRel) {
            state.emit(Severity::Fatal, unit, &message);
        }
        state.record(Severity::Fatal, unit, &message);
        state.outcome_mut(unit).fatal += 1;

        Fatal {
            unit: unit.to_string(),
            message,
        }
    }

    /// Report an accumulated defect unless `cond` holds. Returns `!cond`.
    pub fn error(&self, unit: &str, cond: bool, message: impl Display) -> bool {
        self.soft(Severity::Error, unit, cond, message)
    }

    /// Report a soft heuristic unless `cond` holds. Returns `!cond`.
    pub fn warning(&self, unit: &str, cond: bool, message: impl Display) -> bool {
        self.soft(Severity::Warning, unit, cond, message)
    }

    fn soft(&self, severity: Severity, unit: &str, cond: bool, message: impl Display) -> bool {
        if cond {
            return false;
        }

        let message = message.to_string();
        let mut state = self.lock();
        if !self.is_tripped() {
            state.emit(severity, unit, &message);
        }
        state.record(severity, unit, &message);
        let outcome = state.outcome_mut(unit);
        match severity {
            Severity::Warning => outcome.warnings += 1,
            _ => outcome.errors += 1,
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [`FailFastReporter`] handle bound to one unit name.
///
/// Cheap to clone; every clone shares the same latch and lock.
#[derive(Debug, Clone)]
pub struct UnitReporter {
    unit: Arc<str>,
    reporter: Arc<FailFastReporter>,
}

impl UnitReporter {
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn reporter(&self) -> &Arc<FailFastReporter> {
        &self.reporter
    }

    pub fn outcome(&self) -> ValidationOutcome {
        self.reporter.outcome(&self.unit)
    }

    pub fn is_tripped(&self) -> bool {
        self.reporter.is_tripped()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.reporter.findings(&self.unit)
    }

    pub fn info(&self, message: impl Display) {
        self.reporter.info(&self.unit, message)
    }

    pub fn fatal(&self, cond: bool, message: impl Display) -> Result<(), Fatal> {
        self.reporter.fatal(&self.unit, cond, message)
    }

    pub fn abort(&self, message: impl Display) -> Fatal {
        self.reporter.abort(&self.unit, message)
    }

    pub fn error(&self, cond: bool, message: impl Display) -> bool {
        self.reporter.error(&self.unit, cond, message)
    }

    pub fn warning(&self, cond: bool, message: impl Display) -> bool {
        self.reporter.warning(&self.unit, cond, message)
    }
}
