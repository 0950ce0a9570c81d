//! Service targets: discovery and compose runtime control.
//!
//! A target is one service of the game repository. It owns a directory
//! under `services/` with a compose manifest, and a checker under
//! `checkers/<name>/checker.py`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use crate::error::{CoreError, Fatal, Result};
use crate::reporter::{FailFastReporter, UnitReporter};

pub const SERVICES_DIR: &str = "services";
pub const CHECKERS_DIR: &str = "checkers";
pub const MANIFEST_FILE: &str = "docker-compose.yml";
pub const CHECKER_FILE: &str = "checker.py";

/// Selection value meaning "every service".
pub const SELECT_ALL: &str = "all";

/// Lines of container output shown by [`Target::logs`].
const LOG_TAIL: &str = "2000";

/// One service of the game repository.
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    root: PathBuf,
    reporter: UnitReporter,
}

impl Target {
    /// Open a single target. Fatal if its compose manifest is missing.
    pub fn open(
        root: &Path,
        name: &str,
        reporter: &Arc<FailFastReporter>,
    ) -> std::result::Result<Self, Fatal> {
        let target = Self {
            name: name.to_string(),
            root: root.to_path_buf(),
            reporter: reporter.scope(format!("service {name}")),
        };

        let manifest = target.manifest_path();
        target.reporter.fatal(
            manifest.is_file(),
            format!("{} missing", target.relative(&manifest).display()),
        )?;

        Ok(target)
    }

    /// Resolve the targets selected by `selection`.
    ///
    /// `None` or `"all"` picks every non-hidden directory under `services/`,
    /// sorted by name; anything else names exactly one service.
    pub fn discover(
        root: &Path,
        selection: Option<&str>,
        reporter: &Arc<FailFastReporter>,
    ) -> Result<Vec<Self>> {
        let names = match selection {
            None | Some(SELECT_ALL) => list_service_dirs(&root.join(SERVICES_DIR))?,
            Some(name) => vec![name.to_string()],
        };

        let targets = names
            .iter()
            .map(|name| Self::open(root, name, reporter))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let listed = targets
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        reporter.info("adcheck", format!("Got services: {listed}"));

        Ok(targets)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reporter(&self) -> &UnitReporter {
        &self.reporter
    }

    /// `services/<name>`
    pub fn service_dir(&self) -> PathBuf {
        self.root.join(SERVICES_DIR).join(&self.name)
    }

    /// `services/<name>/docker-compose.yml`
    pub fn manifest_path(&self) -> PathBuf {
        self.service_dir().join(MANIFEST_FILE)
    }

    /// `checkers/<name>/checker.py`
    pub fn checker_path(&self) -> PathBuf {
        self.root
            .join(CHECKERS_DIR)
            .join(&self.name)
            .join(CHECKER_FILE)
    }

    /// `path` relative to the repository root, for messages.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Build and start the service in the background.
    pub async fn up(&self) -> Result<()> {
        self.reporter.info("starting");
        self.run_compose(&["up", "--build", "-d"]).await
    }

    /// Print the tail of the service logs.
    pub async fn logs(&self) -> Result<()> {
        self.reporter.info("printing logs");
        self.run_compose(&["logs", "--tail", LOG_TAIL]).await
    }

    /// Stop the service and drop its volumes.
    pub async fn down(&self) -> Result<()> {
        self.reporter.info("stopping");
        self.run_compose(&["down", "-v"]).await
    }

    async fn run_compose(&self, args: &[&str]) -> Result<()> {
        let manifest = self.manifest_path();
        let command_line = format!("docker-compose -f {} {}", manifest.display(), args.join(" "));

        let status = Command::new("docker-compose")
            .arg("-f")
            .arg(&manifest)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| CoreError::Runtime {
                command: command_line.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(CoreError::Runtime {
                command: command_line,
                reason: status.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service {}", self.name)
    }
}

fn list_service_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn add_service(root: &Path, name: &str) {
        let dir = root.join(SERVICES_DIR).join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), "version: '2.4'\nservices: {}\n").unwrap();
    }

    #[test]
    fn test_discover_all_sorted_and_skips_hidden() {
        let tmp = tempfile::tempdir().unwrap();
        add_service(tmp.path(), "zeta");
        add_service(tmp.path(), "alpha");
        fs::create_dir_all(tmp.path().join(SERVICES_DIR).join(".git")).unwrap();
        fs::write(tmp.path().join(SERVICES_DIR).join("README.md"), "x").unwrap();

        let reporter = FailFastReporter::new();
        let targets = Target::discover(tmp.path(), None, &reporter).unwrap();
        let names: Vec<_> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        let same = Target::discover(tmp.path(), Some(SELECT_ALL), &reporter).unwrap();
        assert_eq!(same.len(), 2);
    }

    #[test]
    fn test_discover_single_service() {
        let tmp = tempfile::tempdir().unwrap();
        add_service(tmp.path(), "alpha");
        add_service(tmp.path(), "beta");

        let reporter = FailFastReporter::new();
        let targets = Target::discover(tmp.path(), Some("beta"), &reporter).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].to_string(), "service beta");
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(SERVICES_DIR).join("broken")).unwrap();

        let reporter = FailFastReporter::new();
        let err = Target::discover(tmp.path(), None, &reporter).unwrap_err();
        match err {
            CoreError::Fatal(fatal) => {
                assert_eq!(fatal.unit, "service broken");
                assert!(fatal.message.contains("docker-compose.yml missing"));
            }
            other => panic!("expected Fatal, got {other:?}"),
        }
        assert!(reporter.is_tripped());
    }

    #[test]
    fn test_missing_services_dir_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let reporter = FailFastReporter::new();
        let err = Target::discover(tmp.path(), None, &reporter).unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }

    #[test]
    fn test_paths() {
        let tmp = tempfile::tempdir().unwrap();
        add_service(tmp.path(), "demo");
        let reporter = FailFastReporter::new();
        let target = Target::open(tmp.path(), "demo", &reporter).unwrap();

        assert_eq!(
            target.relative(&target.checker_path()),
            Path::new("checkers/demo/checker.py")
        );
        assert_eq!(
            target.relative(&target.manifest_path()),
            Path::new("services/demo/docker-compose.yml")
        );
    }
}
