//! Compose manifest rules.
//!
//! Every violation is reported through [`UnitReporter::error`]; a few of
//! them (unparseable document, missing required top-level key, malformed
//! version) make the rest of the file meaningless and stop its validation.
//! Missing dependency edges are only heuristics and go out as warnings.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::reporter::UnitReporter;

use super::dockerfile::base_image;
use super::graph::DependencyGraph;
use super::roles::{classify, ContainerRole};

pub const DC_REQUIRED_OPTIONS: &[&str] = &["version", "services"];
pub const DC_ALLOWED_OPTIONS: &[&str] = &["version", "services", "volumes"];

pub const CONTAINER_REQUIRED_OPTIONS: &[&str] = &["restart"];
pub const CONTAINER_ALLOWED_OPTIONS: &[&str] = &[
    "restart",
    "pids_limit",
    "mem_limit",
    "cpus",
    "build",
    "image",
    "ports",
    "volumes",
    "environment",
    "env_file",
    "depends_on",
    "sysctls",
    "privileged",
    "security_opt",
];

pub const SERVICE_REQUIRED_OPTIONS: &[&str] = &["pids_limit", "mem_limit", "cpus"];
pub const SERVICE_ALLOWED_OPTIONS: &[&str] = CONTAINER_ALLOWED_OPTIONS;

/// The only accepted value of a container's `restart` option.
pub const RESTART_POLICY: &str = "unless-stopped";

/// Accepted manifest versions: `MIN_VERSION <= v < MAX_VERSION`.
pub const MIN_VERSION: f64 = 2.4;
pub const MAX_VERSION: f64 = 3.0;

const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Validate one compose manifest at `path`; `rel` names it in messages and
/// `root` is the repository root used to shorten build recipe paths.
pub fn validate_manifest(reporter: &UnitReporter, path: &Path, rel: &str, root: &Path) {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            reporter.error(false, format!("cannot read {rel}: {e}"));
            return;
        }
    };

    let doc: Value = match serde_yaml::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            reporter.error(false, format!("{rel} is not valid yaml: {e}"));
            return;
        }
    };

    ManifestCheck {
        reporter,
        rel,
        root,
        manifest_dir: path.parent().unwrap_or(Path::new(".")),
    }
    .run(&doc);
}

struct ManifestCheck<'a> {
    reporter: &'a UnitReporter,
    rel: &'a str,
    root: &'a Path,
    manifest_dir: &'a Path,
}

impl ManifestCheck<'_> {
    fn run(&self, doc: &Value) {
        let rel = self.rel;
        let Some(doc) = doc.as_mapping() else {
            self.reporter.error(false, format!("{rel} is not dict"));
            return;
        };

        for opt in DC_REQUIRED_OPTIONS {
            if self.reporter.error(
                doc.contains_key(*opt),
                format!("required option {opt} not in {rel}"),
            ) {
                return;
            }
        }

        if !self.check_version(doc) {
            return;
        }

        for key in doc.keys() {
            let key = key_name(key);
            self.reporter.error(
                DC_ALLOWED_OPTIONS.contains(&key.as_str()),
                format!("option {key} in {rel} is not allowed"),
            );
        }

        let Some(containers) = doc.get("services").and_then(Value::as_mapping) else {
            self.reporter
                .error(false, format!("services option in {rel} is not dict"));
            return;
        };

        self.check_containers(containers);
    }

    /// Returns `false` when the version is too malformed to go on.
    fn check_version(&self, doc: &Mapping) -> bool {
        let rel = self.rel;
        let Some(raw) = doc.get("version").and_then(Value::as_str) else {
            self.reporter
                .error(false, format!("version option in {rel} is not string"));
            return false;
        };

        let Ok(version) = raw.trim().parse::<f64>() else {
            self.reporter
                .error(false, format!("version option in {rel} is not float"));
            return false;
        };

        self.reporter.error(
            (MIN_VERSION..MAX_VERSION).contains(&version),
            format!("invalid version in {rel}, need >={MIN_VERSION} and <{MAX_VERSION}, got {version}"),
        );
        true
    }

    fn check_containers(&self, containers: &Mapping) {
        let mut graph = DependencyGraph::new();
        let mut services = Vec::new();
        let mut databases = Vec::new();
        let mut proxies = Vec::new();

        for (name, conf) in containers {
            let name = key_name(name);
            let Some(role) = self.check_container(&name, conf, &mut graph) else {
                continue;
            };
            match role {
                ContainerRole::Service => services.push(name),
                ContainerRole::Database => databases.push(name),
                ContainerRole::Proxy => proxies.push(name),
                ContainerRole::Cleaner => {}
            }
        }

        for service in &services {
            for database in &databases {
                self.reporter.warning(
                    graph.depends_on(service, database),
                    format!("service {service} may need to depends_on database {database}"),
                );
            }
        }

        for proxy in &proxies {
            for service in &services {
                self.reporter.warning(
                    graph.depends_on(proxy, service),
                    format!("proxy {proxy} may need to depends_on service {service}"),
                );
            }
        }
    }

    /// Validate one container; returns its role when it could be classified.
    fn check_container(
        &self,
        name: &str,
        conf: &Value,
        graph: &mut DependencyGraph,
    ) -> Option<ContainerRole> {
        let rel = self.rel;
        let Some(conf) = conf.as_mapping() else {
            self.reporter.error(
                false,
                format!("config in {rel} for container {name} is not dict"),
            );
            return None;
        };

        for opt in CONTAINER_REQUIRED_OPTIONS {
            self.reporter.error(
                conf.contains_key(*opt),
                format!("required option {opt} not in {rel} for container {name}"),
            );
        }

        if let Some(restart) = conf.get("restart") {
            self.reporter.error(
                restart.as_str() == Some(RESTART_POLICY),
                format!(
                    "restart option in {rel} for container {name} must be equal to \"{RESTART_POLICY}\""
                ),
            );
        }

        for key in conf.keys() {
            let key = key_name(key);
            self.reporter.error(
                CONTAINER_ALLOWED_OPTIONS.contains(&key.as_str()),
                format!("option {key} in {rel} is not allowed for container {name}"),
            );
        }

        let has_image = conf.contains_key("image");
        let has_build = conf.contains_key("build");
        if self.reporter.error(
            !(has_image && has_build),
            format!("both image and build options in {rel} for container {name}"),
        ) {
            return None;
        }
        if self.reporter.error(
            has_image || has_build,
            format!("both image and build options not in {rel} for container {name}"),
        ) {
            return None;
        }

        let image = if has_image {
            let image = conf.get("image").and_then(Value::as_str);
            if self.reporter.error(
                image.is_some(),
                format!("image option in {rel} for container {name} is not string"),
            ) {
                return None;
            }
            image.unwrap_or_default().to_string()
        } else {
            self.build_base_image(name, conf.get("build").unwrap_or(&Value::Null))?
        };

        if let Some(deps) = conf.get("depends_on") {
            self.collect_dependencies(name, deps, graph);
        }

        let role = classify(&image);
        if role == ContainerRole::Service {
            for opt in SERVICE_REQUIRED_OPTIONS {
                self.reporter.error(
                    conf.contains_key(*opt),
                    format!("required option {opt} not in {rel} for service {name}"),
                );
            }
            for key in conf.keys() {
                let key = key_name(key);
                self.reporter.error(
                    SERVICE_ALLOWED_OPTIONS.contains(&key.as_str()),
                    format!("option {key} in {rel} is not allowed for service {name}"),
                );
            }
        }
        Some(role)
    }

    /// Resolve the build recipe of a container and return its base image.
    fn build_base_image(&self, name: &str, build: &Value) -> Option<String> {
        let rel = self.rel;
        let dockerfile = match build {
            Value::String(context) => self.manifest_dir.join(context).join(DEFAULT_DOCKERFILE),
            Value::Mapping(build) => {
                let Some(context) = build.get("context").and_then(Value::as_str) else {
                    self.reporter.error(
                        false,
                        format!("build option in {rel} for container {name} has no context"),
                    );
                    return None;
                };
                let file = build
                    .get("dockerfile")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_DOCKERFILE);
                self.manifest_dir.join(context).join(file)
            }
            _ => {
                self.reporter.error(
                    false,
                    format!("build option in {rel} for container {name} is neither string nor dict"),
                );
                return None;
            }
        };

        let shown = self.display(&dockerfile);
        let content = fs::read_to_string(&dockerfile).ok();
        if self.reporter.error(
            content.is_some(),
            format!("no dockerfile found in {shown}"),
        ) {
            return None;
        }

        let image = content.as_deref().and_then(base_image);
        if self
            .reporter
            .error(image.is_some(), format!("no image option in {shown}"))
        {
            return None;
        }
        image
    }

    fn collect_dependencies(&self, name: &str, deps: &Value, graph: &mut DependencyGraph) {
        match deps {
            Value::Sequence(items) => {
                for dep in items {
                    graph.add_edge(name, key_name(dep));
                }
            }
            Value::Mapping(items) => {
                for dep in items.keys() {
                    graph.add_edge(name, key_name(dep));
                }
            }
            _ => {
                self.reporter.error(
                    false,
                    format!(
                        "depends_on option in {} for container {name} is neither list nor dict",
                        self.rel
                    ),
                );
            }
        }
    }

    fn display(&self, path: &Path) -> String {
        let normalized: PathBuf = path.components().collect();
        normalized
            .strip_prefix(self.root)
            .unwrap_or(&normalized)
            .display()
            .to_string()
    }
}

/// Render a YAML key for messages and lookups.
fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
