//! Bounded execution of a single checker process.

use std::borrow::Cow;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Exit status a checker uses to report success.
pub const SUCCESS_EXIT_CODE: i32 = 101;

/// Exit status recorded when the process outlived its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit status recorded when the process was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// How long the readers may keep draining pipes after a timed-out child is
/// killed. Grandchildren can hold the pipes open past that.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Result of one process invocation.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Captured stdout (public channel).
    pub stdout: Vec<u8>,

    /// Captured stderr (private channel).
    pub stderr: Vec<u8>,

    /// Exit code, or one of the sentinels above.
    pub exit_code: i32,

    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// Whether the process reported protocol-level success.
    pub fn succeeded(&self) -> bool {
        self.exit_code == SUCCESS_EXIT_CODE
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }

    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// Errors that prevent a process from being run at all.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect output of {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs one external program under a hard wall-clock bound.
pub struct ProcessContract;

impl ProcessContract {
    /// Run `executable` with `args` and capture its output.
    ///
    /// The child is killed once `timeout` elapses and the result carries
    /// [`TIMEOUT_EXIT_CODE`] together with whatever the child had written
    /// so far. Never retries.
    pub async fn run(
        executable: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<ExecutionResult, ProcessError> {
        let start = Instant::now();
        let program = executable.display().to_string();

        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut stdout = PipeCapture::spawn(child.stdout.take());
        let mut stderr = PipeCapture::spawn(child.stderr.take());

        let waited = tokio::time::timeout(timeout, async {
            let status = child.wait().await?;
            stdout.finish().await?;
            stderr.finish().await?;
            Ok::<_, io::Error>(status)
        })
        .await;

        let exit_code = match waited {
            Ok(status) => status
                .map_err(|source| ProcessError::Wait { program, source })?
                .code()
                .unwrap_or(SIGNAL_EXIT_CODE),
            Err(_) => {
                let _ = child.kill().await;
                let _ = tokio::time::timeout(DRAIN_GRACE, async {
                    let _ = stdout.finish().await;
                    let _ = stderr.finish().await;
                })
                .await;
                TIMEOUT_EXIT_CODE
            }
        };

        Ok(ExecutionResult {
            stdout: stdout.take(),
            stderr: stderr.take(),
            exit_code,
            elapsed: start.elapsed(),
        })
    }
}

/// Background copy of one child pipe into a shared buffer, so the bytes
/// read so far survive a timeout.
struct PipeCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    /// Cleared once joined; a finished handle must not be polled again.
    reader: Option<JoinHandle<io::Result<()>>>,
}

impl PipeCapture {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let reader = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return Ok(());
            };
            let mut chunk = [0u8; 8192];
            loop {
                let n = pipe.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(());
                }
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]);
            }
        });
        Self {
            buffer,
            reader: Some(reader),
        }
    }

    /// Wait for the pipe to reach EOF.
    async fn finish(&mut self) -> io::Result<()> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };
        let joined = reader.await;
        self.reader = None;
        joined.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    /// Stop reading and hand back everything captured.
    fn take(self) -> Vec<u8> {
        if let Some(reader) = self.reader {
            reader.abort();
        }
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_success_is_only_the_sentinel() {
        let mut result = ExecutionResult {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 0,
            elapsed: Duration::from_millis(5),
        };
        assert!(!result.succeeded());

        result.exit_code = SUCCESS_EXIT_CODE;
        assert!(result.succeeded());
        assert!(!result.timed_out());
    }

    #[tokio::test]
    async fn test_captures_both_channels() {
        let result = ProcessContract::run(
            Path::new("sh"),
            &sh("echo public; echo private >&2; exit 101"),
            Duration::from_secs(10),
        )
        .await
        .expect("run failed");

        assert!(result.succeeded());
        assert_eq!(result.stdout_lossy(), "public\n");
        assert_eq!(result.stderr_lossy(), "private\n");
    }

    #[tokio::test]
    async fn test_zero_exit_is_reported_verbatim() {
        let result = ProcessContract::run(Path::new("sh"), &sh("exit 0"), Duration::from_secs(10))
            .await
            .expect("run failed");
        assert_eq!(result.exit_code, 0);
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn test_timeout_yields_sentinel() {
        let result = ProcessContract::run(
            Path::new("sh"),
            &sh("sleep 5; exit 101"),
            Duration::from_millis(200),
        )
        .await
        .expect("run failed");

        assert!(result.timed_out());
        assert!(result.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let result = ProcessContract::run(
            Path::new("sh"),
            &sh("echo partial; echo half-done >&2; sleep 5; exit 101"),
            Duration::from_millis(500),
        )
        .await
        .expect("run failed");

        assert!(result.timed_out());
        assert!(result.elapsed < Duration::from_secs(5));
        assert_eq!(result.stdout_lossy(), "partial\n");
        assert_eq!(result.stderr_lossy(), "half-done\n");
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let err = ProcessContract::run(
            Path::new("/nonexistent/checker.py"),
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
