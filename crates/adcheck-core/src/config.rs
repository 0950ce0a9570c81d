//! Harness configuration resolved from the environment.

/// Default number of rounds per checker.
pub const DEFAULT_RUNS: usize = 10;

/// Default host the checkers are pointed at.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Settings for one validation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Host passed to every checker invocation.
    pub host: String,

    /// Number of rounds to run per checker.
    pub runs: usize,

    /// Global ceiling on concurrent rounds.
    pub max_threads: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            runs: DEFAULT_RUNS,
            max_threads: Self::default_max_threads(),
        }
    }
}

impl HarnessConfig {
    /// Twice the number of available CPUs.
    pub fn default_max_threads() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(2)
    }

    /// Worker count for this configuration.
    pub fn pool_size(&self) -> usize {
        pool_size(self.runs, self.max_threads)
    }
}

/// `max(1, min(max_threads, runs / 10))`.
///
/// Bounded by the global ceiling and by a tenth of the workload, so a
/// small batch never gets more workers than it has use for.
pub fn pool_size(runs: usize, max_threads: usize) -> usize {
    max_threads.min(runs / 10).max(1)
}
