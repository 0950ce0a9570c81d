//! Checker contract enforcement for adcheck.
//!
//! - [`runner`]: bounded execution of one checker process
//! - [`info`]: the checker's self-description
//! - [`proxy`]: the `info`/`check`/`put`/`get` protocol
//! - [`harness`]: concurrent rounds on a worker pool
//! - [`tasks`]: scheduler task descriptions

pub mod flag;
pub mod harness;
pub mod info;
pub mod proxy;
pub mod runner;
pub mod tasks;

pub use flag::{generate_flag, generate_flag_id, FlagRecord};
pub use harness::{HarnessSummary, ValidationHarness};
pub use info::{ContractInfo, InfoError, MAX_TIMEOUT_SECS};
pub use proxy::{Action, CheckerProxy, BOOTSTRAP_TIMEOUT};
pub use runner::{ExecutionResult, ProcessContract, ProcessError, SUCCESS_EXIT_CODE, TIMEOUT_EXIT_CODE};
pub use tasks::{TaskDump, TaskEntry};
