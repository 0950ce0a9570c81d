//! Structure validation for one service of the game repository.
//!
//! Walks `checkers/`, `services/`, `internal/` and `sploits/` for the
//! selected service and reports every defect it finds through the
//! reporter's `error` channel, instead of stopping at the first one.
//!
//! # Modules
//!
//! - [`compose`]    - compose manifest schema and per-container rules
//! - [`roles`]      - ordered keyword table for container roles
//! - [`graph`]      - `depends_on` edges for the dependency heuristics
//! - [`dockerfile`] - base image extraction from build recipes
//! - [`patterns`]   - forbidden source patterns in checker code

pub mod compose;
pub mod dockerfile;
pub mod graph;
pub mod patterns;
pub mod roles;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::reporter::{FailFastReporter, UnitReporter};
use crate::target::{Target, CHECKERS_DIR, MANIFEST_FILE};

pub use compose::{validate_manifest, RESTART_POLICY};
pub use dockerfile::base_image;
pub use graph::DependencyGraph;
pub use patterns::forbidden_occurrences;
pub use roles::{classify, ContainerRole, ROLE_KEYWORDS};

/// Top-level directories that may hold per-service content.
pub const VALIDATE_DIRS: &[&str] = &["checkers", "services", "internal", "sploits"];

/// Placeholder name that is rejected in favour of `.keep`.
const REJECTED_PLACEHOLDER: &str = ".gitkeep";

/// Validates the on-disk layout of one service.
#[derive(Debug)]
pub struct StructureValidator {
    root: PathBuf,
    service: String,
    reporter: UnitReporter,
}

impl StructureValidator {
    pub fn new(root: &Path, service: &str, reporter: &Arc<FailFastReporter>) -> Self {
        Self {
            root: root.to_path_buf(),
            service: service.to_string(),
            reporter: reporter.scope(format!("structure validator for {service}")),
        }
    }

    pub fn for_target(target: &Target) -> Self {
        Self::new(target.root(), target.name(), target.reporter().reporter())
    }

    pub fn reporter(&self) -> &UnitReporter {
        &self.reporter
    }

    /// Validate every directory of the service.
    ///
    /// Returns `true` when this pass reported no error.
    pub fn validate(&self) -> bool {
        let before = self.reporter.outcome().defects();
        for dir in VALIDATE_DIRS {
            self.validate_dir(&self.root.join(dir).join(&self.service));
        }
        self.reporter.outcome().defects() == before
    }

    fn validate_dir(&self, dir: &Path) {
        if !dir.exists() {
            return;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                self.reporter.error(
                    false,
                    format!("cannot read directory {}: {e}", self.relative(dir)),
                );
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        paths.sort();

        for path in paths {
            if path.is_file() {
                self.validate_file(&path);
            } else if !file_name(&path).starts_with('.') {
                self.validate_dir(&path);
            }
        }
    }

    fn validate_file(&self, path: &Path) {
        let rel = self.relative(path);
        let name = file_name(path);
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        debug!(file = %rel, "validating");

        self.reporter
            .error(extension != "yaml", format!("file {rel} has .yaml extension"));
        self.reporter.error(
            name != REJECTED_PLACEHOLDER,
            format!("{rel} found, should be named .keep"),
        );

        if name == MANIFEST_FILE {
            validate_manifest(&self.reporter, path, &rel, &self.root);
        } else if extension == "py" && path.starts_with(self.root.join(CHECKERS_DIR)) {
            self.validate_checker_source(path, &rel);
        }
    }

    fn validate_checker_source(&self, path: &Path, rel: &str) {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                self.reporter
                    .error(false, format!("cannot read {rel}: {e}"));
                return;
            }
        };

        for pattern in forbidden_occurrences(&source) {
            self.reporter
                .error(false, format!("forbidden pattern \"{pattern}\" in {rel}"));
        }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

impl fmt::Display for StructureValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reporter.unit())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
