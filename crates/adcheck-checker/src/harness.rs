//! Concurrent validation of one checker.
//!
//! A fixed pool of tokio tasks drains a shared round counter. Each round is
//! [`CheckerProxy::run_round`]; the first [`Fatal`] any worker hits becomes
//! the harness result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use adcheck_core::{Fatal, HarnessConfig};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::proxy::CheckerProxy;

/// Totals for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarnessSummary {
    pub rounds: usize,
    pub flags: usize,
}

impl HarnessSummary {
    fn merge(&mut self, other: HarnessSummary) {
        self.rounds += other.rounds;
        self.flags += other.flags;
    }
}

/// Runs `runs` rounds of one checker on a bounded worker pool.
#[derive(Debug)]
pub struct ValidationHarness {
    proxy: Arc<CheckerProxy>,
    runs: usize,
    pool_size: usize,
}

impl ValidationHarness {
    pub fn new(proxy: Arc<CheckerProxy>, config: &HarnessConfig) -> Self {
        Self {
            proxy,
            runs: config.runs,
            pool_size: config.pool_size(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Run every round and join all workers.
    ///
    /// All `runs` rounds are dispatched no matter what: a fatal, here or in
    /// any other unit, only silences the reporter. The first fatal seen
    /// becomes the result. Failed rounds are not retried.
    pub async fn run(&self) -> Result<HarnessSummary, Fatal> {
        let reporter = self.proxy.reporter();
        reporter.info(format!("starting {} checker workers", self.pool_size));

        let next_round = Arc::new(AtomicUsize::new(1));
        let workers: Vec<JoinHandle<(HarnessSummary, Option<Fatal>)>> = (0..self.pool_size)
            .map(|worker| {
                let proxy = Arc::clone(&self.proxy);
                let next_round = Arc::clone(&next_round);
                let total = self.runs;
                tokio::spawn(async move { drain_rounds(worker, proxy, next_round, total).await })
            })
            .collect();

        let mut summary = HarnessSummary::default();
        let mut first_fatal = None;
        for worker in workers {
            let (done, fatal) = match worker.await {
                Ok(report) => report,
                Err(e) => (
                    HarnessSummary::default(),
                    Some(reporter.abort(format!("round worker panicked: {e}"))),
                ),
            };
            summary.merge(done);
            if let Some(fatal) = fatal {
                first_fatal.get_or_insert(fatal);
            }
        }

        match first_fatal {
            Some(fatal) => Err(fatal),
            None => Ok(summary),
        }
    }
}

/// Pull rounds until the queue is empty. A failed round does not stop the
/// worker; its first fatal is handed back alongside the passed rounds.
async fn drain_rounds(
    worker: usize,
    proxy: Arc<CheckerProxy>,
    next_round: Arc<AtomicUsize>,
    total: usize,
) -> (HarnessSummary, Option<Fatal>) {
    let mut summary = HarnessSummary::default();
    let mut first_fatal = None;
    loop {
        let round = next_round.fetch_add(1, Ordering::Relaxed);
        if round > total {
            break;
        }

        match proxy.run_round(round, total).await {
            Ok(flags) => summary.merge(HarnessSummary {
                rounds: 1,
                flags: flags.len(),
            }),
            Err(fatal) => {
                debug!(worker, round, "round failed");
                first_fatal.get_or_insert(fatal);
            }
        }
    }
    (summary, first_fatal)
}
