//! The four-action checker protocol.
//!
//! A [`CheckerProxy`] wraps one checker executable and speaks
//! `info`/`check`/`put`/`get` to it through [`ProcessContract`], turning every
//! contract violation into a reported [`Fatal`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use adcheck_core::{FailFastReporter, Fatal, Target, UnitReporter};

use crate::flag::FlagRecord;
use crate::info::ContractInfo;
use crate::runner::{ExecutionResult, ProcessContract, TIMEOUT_EXIT_CODE};

/// Timeout for the `info` action, before the checker has declared its own.
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(3);

/// Protocol actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Info,
    Check,
    Put,
    Get,
}

impl Action {
    /// Name passed as the checker's first argument.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Info => "info",
            Action::Check => "check",
            Action::Put => "put",
            Action::Get => "get",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// Protocol client for one checker.
///
/// Immutable after [`CheckerProxy::connect`]; share it between rounds with
/// an `Arc`.
#[derive(Debug)]
pub struct CheckerProxy {
    name: String,
    executable: PathBuf,
    host: String,
    info: ContractInfo,
    reporter: UnitReporter,
}

impl CheckerProxy {
    /// Verify the executable and fetch its [`ContractInfo`].
    pub async fn connect(
        name: &str,
        executable: &Path,
        host: &str,
        reporter: &Arc<FailFastReporter>,
    ) -> Result<Self, Fatal> {
        let reporter = reporter.scope(format!("checker {name}"));
        reporter.fatal(
            is_executable(executable),
            format!("{} must be executable", executable.display()),
        )?;

        reporter.info("running info action");
        let result = invoke(
            &reporter,
            executable,
            Action::Info,
            &[host.to_string()],
            BOOTSTRAP_TIMEOUT,
        )
        .await?;

        let info = ContractInfo::parse(&result.stdout).map_err(|e| reporter.abort(e))?;
        reporter.info(format!(
            "got info: vulns={} timeout={} attack_data={}",
            info.vulnerability_count, info.timeout_secs, info.uses_attack_data
        ));

        Ok(Self {
            name: name.to_string(),
            executable: executable.to_path_buf(),
            host: host.to_string(),
            info,
            reporter,
        })
    }

    /// Connect to the checker of `target`.
    pub async fn for_target(
        target: &Target,
        host: &str,
        reporter: &Arc<FailFastReporter>,
    ) -> Result<Self, Fatal> {
        Self::connect(target.name(), &target.checker_path(), host, reporter).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &ContractInfo {
        &self.info
    }

    pub fn reporter(&self) -> &UnitReporter {
        &self.reporter
    }

    /// Run the `check` action.
    pub async fn check(&self) -> Result<(), Fatal> {
        self.reporter.info("running CHECK");
        self.invoke(Action::Check, &[]).await?;
        Ok(())
    }

    /// Store `flag` and return the identifier the checker chose for it.
    ///
    /// The identifier comes back on stderr; stdout is public and, for
    /// checkers that publish attack data, must not contain the flag.
    pub async fn put(&self, flag: &str, flag_id: &str, slot: u32) -> Result<String, Fatal> {
        self.reporter
            .info(format!("running PUT, flag={flag} flag_id={flag_id} vuln={slot}"));
        let result = self
            .invoke(Action::Put, &[flag_id.to_string(), flag.to_string(), slot.to_string()])
            .await?;

        self.reporter.fatal(!result.stdout.is_empty(), "stdout is empty")?;

        let new_flag_id = result.stderr_lossy().trim().to_string();
        self.reporter
            .fatal(!new_flag_id.is_empty(), "returned flag_id is empty")?;

        if self.info.uses_attack_data {
            self.reporter.fatal(
                !result.stdout_lossy().contains(flag),
                "flag is leaked in public data",
            )?;
        }

        Ok(new_flag_id)
    }

    /// Ask the checker to confirm `flag` is still retrievable via `flag_id`.
    pub async fn get(&self, flag: &str, flag_id: &str, slot: u32) -> Result<(), Fatal> {
        self.reporter
            .info(format!("running GET, flag={flag} flag_id={flag_id} vuln={slot}"));
        self.invoke(Action::Get, &[flag_id.to_string(), flag.to_string(), slot.to_string()])
            .await?;
        Ok(())
    }

    /// One round: `check`, then a put/get pair per vulnerability slot.
    ///
    /// Each `get` uses the identifier its `put` returned, so the pair runs
    /// strictly in sequence. Returns the flags that made the round trip.
    pub async fn run_round(&self, round: usize, total: usize) -> Result<Vec<FlagRecord>, Fatal> {
        self.reporter
            .info(format!("running all actions (run {round} of {total})"));
        self.check().await?;

        let mut flags = Vec::with_capacity(self.info.vulnerability_count as usize);
        for slot in 1..=self.info.vulnerability_count {
            let mut record = FlagRecord::generate(&self.name, slot);
            record.id = self.put(&record.value, &record.id, slot).await?;
            self.get(&record.value, &record.id, slot).await?;
            flags.push(record);
        }
        Ok(flags)
    }

    async fn invoke(&self, action: Action, extra: &[String]) -> Result<ExecutionResult, Fatal> {
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(self.host.clone());
        args.extend_from_slice(extra);
        invoke(
            &self.reporter,
            &self.executable,
            action,
            &args,
            self.info.timeout(),
        )
        .await
    }
}

impl fmt::Display for CheckerProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "checker {}", self.name)
    }
}

/// Run `<executable> <action> <args...>` and enforce the exit-code contract.
async fn invoke(
    reporter: &UnitReporter,
    executable: &Path,
    action: Action,
    args: &[String],
    timeout: Duration,
) -> Result<ExecutionResult, Fatal> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(action.as_str().to_string());
    argv.extend_from_slice(args);

    let result = ProcessContract::run(executable, &argv, timeout)
        .await
        .map_err(|e| reporter.abort(format!("action {action}: {e}")))?;

    reporter.info(format!(
        "action: {action}\ntime: {:.2}s\nstdout:\n{}\nstderr:\n{}",
        result.elapsed.as_secs_f64(),
        result.stdout_lossy().trim_end_matches('\n'),
        result.stderr_lossy().trim_end_matches('\n'),
    ));

    reporter.fatal(
        !result.timed_out(),
        format!("action {action}: bad return code: {TIMEOUT_EXIT_CODE}, probably timeout"),
    )?;
    reporter.fatal(
        result.succeeded(),
        format!("action {action}: bad return code: {}", result.exit_code),
    )?;

    Ok(result)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
