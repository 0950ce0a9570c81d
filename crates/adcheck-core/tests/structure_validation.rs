//! End-to-end structure validation over throwaway repository trees.

use std::fs;
use std::path::Path;

use adcheck_core::{FailFastReporter, Severity, StructureValidator, ValidationOutcome};
use tempfile::TempDir;

const VALID_MANIFEST: &str = r#"version: '2.4'
services:
  app:
    build: app
    restart: unless-stopped
    pids_limit: 256
    mem_limit: 512M
    cpus: 1
    depends_on:
      - db
  db:
    image: redis:6.2-alpine
    restart: unless-stopped
  proxy:
    image: nginx:1.21-alpine
    restart: unless-stopped
    ports:
      - "8080:80"
    depends_on:
      - app
"#;

const CHECKER_SOURCE: &str = r#"#!/usr/bin/env python3
import requests
from checklib import *

class Checker(BaseChecker):
    def action(self, action, *args, **kwargs):
        try:
            super(Checker, self).action(action, *args, **kwargs)
        except requests.exceptions.ConnectionError:
            self.cquit(Status.DOWN, 'Connection error', 'Got requests connection error')
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture(manifest: &str) -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "services/demo/docker-compose.yml", manifest);
    write(
        tmp.path(),
        "services/demo/app/Dockerfile",
        "FROM python:3.9-slim\nCOPY . /app\n",
    );
    write(tmp.path(), "checkers/demo/checker.py", CHECKER_SOURCE);
    write(tmp.path(), "sploits/demo/.keep", "");
    tmp
}

fn validate(root: &Path) -> (bool, ValidationOutcome) {
    let reporter = FailFastReporter::new();
    let validator = StructureValidator::new(root, "demo", &reporter);
    let ok = validator.validate();
    (ok, validator.reporter().outcome())
}

/// Error messages of one validation pass, in the order they were reported.
fn errors(root: &Path) -> Vec<String> {
    let reporter = FailFastReporter::new();
    let validator = StructureValidator::new(root, "demo", &reporter);
    validator.validate();
    validator
        .reporter()
        .findings()
        .into_iter()
        .filter(|f| f.severity == Severity::Error)
        .map(|f| f.message)
        .collect()
}

const MANIFEST_REL: &str = "services/demo/docker-compose.yml";

#[test]
fn test_valid_service_has_no_defects() {
    let tmp = fixture(VALID_MANIFEST);
    let (ok, outcome) = validate(tmp.path());
    assert!(ok);
    assert_eq!(outcome, ValidationOutcome::default());
}

#[test]
fn test_revalidation_is_idempotent() {
    let tmp = fixture(VALID_MANIFEST);
    let reporter = FailFastReporter::new();
    let validator = StructureValidator::new(tmp.path(), "demo", &reporter);

    assert!(validator.validate());
    assert!(validator.validate());
    assert_eq!(validator.reporter().outcome().defects(), 0);
}

#[test]
fn test_missing_service_limit_is_single_defect() {
    let tmp = fixture(&VALID_MANIFEST.replace("    pids_limit: 256\n", ""));
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
    assert_eq!(
        errors(tmp.path()),
        vec![format!("required option pids_limit not in {MANIFEST_REL} for service app")]
    );
}

#[test]
fn test_missing_restart_is_single_defect() {
    let manifest = VALID_MANIFEST.replacen(
        "    image: redis:6.2-alpine\n    restart: unless-stopped\n",
        "    image: redis:6.2-alpine\n",
        1,
    );
    let tmp = fixture(&manifest);
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
    assert_eq!(
        errors(tmp.path()),
        vec![format!("required option restart not in {MANIFEST_REL} for container db")]
    );
}

#[test]
fn test_missing_top_level_key_is_single_defect() {
    let tmp = fixture(&VALID_MANIFEST.replace("version: '2.4'\n", ""));
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
    assert_eq!(
        errors(tmp.path()),
        vec![format!("required option version not in {MANIFEST_REL}")]
    );
}

#[test]
fn test_missing_services_key_names_it() {
    let tmp = fixture("version: '2.4'\nvolumes: {}\n");
    assert_eq!(
        errors(tmp.path()),
        vec![format!("required option services not in {MANIFEST_REL}")]
    );
}

#[test]
fn test_version_boundaries() {
    for (version, expected) in [("2.4", true), ("2.9", true), ("3.0", false), ("2.39", false)] {
        let manifest = VALID_MANIFEST.replace("'2.4'", &format!("'{version}'"));
        let tmp = fixture(&manifest);
        let (ok, _) = validate(tmp.path());
        assert_eq!(ok, expected, "version {version}");
    }
}

#[test]
fn test_version_out_of_range_names_it() {
    let tmp = fixture(&VALID_MANIFEST.replace("'2.4'", "'3.0'"));
    assert_eq!(
        errors(tmp.path()),
        vec![format!("invalid version in {MANIFEST_REL}, need >=2.4 and <3, got 3")]
    );
}

#[test]
fn test_version_must_be_string() {
    let tmp = fixture(&VALID_MANIFEST.replace("'2.4'", "2.4"));
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
    assert_eq!(
        errors(tmp.path()),
        vec![format!("version option in {MANIFEST_REL} is not string")]
    );
}

#[test]
fn test_version_must_be_float() {
    let tmp = fixture(&VALID_MANIFEST.replace("'2.4'", "'two'"));
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
    assert_eq!(
        errors(tmp.path()),
        vec![format!("version option in {MANIFEST_REL} is not float")]
    );
}

#[test]
fn test_unknown_top_level_key() {
    let tmp = fixture(&format!("{VALID_MANIFEST}networks:\n  default: {{}}\n"));
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
}

#[test]
fn test_wrong_restart_policy() {
    let manifest = VALID_MANIFEST.replacen("restart: unless-stopped", "restart: always", 1);
    let tmp = fixture(&manifest);
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
    assert_eq!(
        errors(tmp.path()),
        vec![format!(
            "restart option in {MANIFEST_REL} for container app must be equal to \"unless-stopped\""
        )]
    );
}

#[test]
fn test_unknown_container_key() {
    let manifest = VALID_MANIFEST.replace(
        "    image: redis:6.2-alpine\n",
        "    image: redis:6.2-alpine\n    network_mode: host\n",
    );
    let tmp = fixture(&manifest);
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
    assert_eq!(
        errors(tmp.path()),
        vec![format!("option network_mode in {MANIFEST_REL} is not allowed for container db")]
    );
}

#[test]
fn test_image_and_build_are_exclusive() {
    let both = VALID_MANIFEST.replace("    build: app\n", "    build: app\n    image: python:3.9\n");
    let tmp = fixture(&both);
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);

    let neither = VALID_MANIFEST.replace("    build: app\n", "");
    let tmp = fixture(&neither);
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    // The container is not classified, so the dependency heuristics have
    // no service to complain about.
    assert_eq!(outcome.errors, 1);
    assert_eq!(outcome.warnings, 0);
}

#[test]
fn test_missing_dockerfile_skips_classification() {
    let tmp = fixture(&VALID_MANIFEST.replace("    pids_limit: 256\n", ""));
    fs::remove_file(tmp.path().join("services/demo/app/Dockerfile")).unwrap();

    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    // Only the missing recipe; the missing service limit is never checked.
    assert_eq!(outcome.errors, 1);
}

#[test]
fn test_build_mapping_with_custom_dockerfile() {
    let manifest = VALID_MANIFEST.replace(
        "    build: app\n",
        "    build:\n      context: app\n      dockerfile: Dockerfile.prod\n",
    );
    let tmp = fixture(&manifest);
    write(tmp.path(), "services/demo/app/Dockerfile.prod", "FROM golang:1.17\n");

    let (ok, outcome) = validate(tmp.path());
    assert!(ok);
    assert_eq!(outcome, ValidationOutcome::default());
}

#[test]
fn test_dockerfile_without_from() {
    let tmp = fixture(VALID_MANIFEST);
    write(tmp.path(), "services/demo/app/Dockerfile", "RUN echo hi\n");
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
}

#[test]
fn test_database_is_not_held_to_service_limits() {
    // db has no pids_limit/mem_limit/cpus and still passes.
    let tmp = fixture(VALID_MANIFEST);
    let (ok, _) = validate(tmp.path());
    assert!(ok);

    // The same container classified as a service fails on all three.
    let manifest = VALID_MANIFEST.replace("redis:6.2-alpine", "python:3.9");
    let tmp = fixture(&manifest);
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 3);
    assert_eq!(
        errors(tmp.path()),
        ["pids_limit", "mem_limit", "cpus"]
            .iter()
            .map(|opt| format!("required option {opt} not in {MANIFEST_REL} for service db"))
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_missing_dependency_edges_are_warnings() {
    let manifest = VALID_MANIFEST
        .replace("    depends_on:\n      - db\n", "")
        .replace("    depends_on:\n      - app\n", "");
    let tmp = fixture(&manifest);
    let (ok, outcome) = validate(tmp.path());
    assert!(ok);
    assert_eq!(outcome.errors, 0);
    assert_eq!(outcome.warnings, 2);
}

#[test]
fn test_depends_on_mapping_form() {
    let manifest = VALID_MANIFEST.replace(
        "    depends_on:\n      - db\n",
        "    depends_on:\n      db:\n        condition: service_started\n",
    );
    let tmp = fixture(&manifest);
    let (ok, outcome) = validate(tmp.path());
    assert!(ok);
    assert_eq!(outcome.warnings, 0);
}

#[test]
fn test_manifest_not_a_mapping() {
    let tmp = fixture("- just\n- a list\n");
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
}

#[test]
fn test_unparseable_manifest() {
    let tmp = fixture("version: [unclosed\n");
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
}

#[test]
fn test_rejected_file_names() {
    let tmp = fixture(VALID_MANIFEST);
    write(tmp.path(), "internal/demo/.gitkeep", "");
    write(tmp.path(), "internal/demo/config.yaml", "a: 1\n");

    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 2);
}

#[test]
fn test_hidden_directories_are_skipped() {
    let tmp = fixture(VALID_MANIFEST);
    write(tmp.path(), "services/demo/.cache/.gitkeep", "");
    let (ok, _) = validate(tmp.path());
    assert!(ok);
}

#[test]
fn test_forbidden_pattern_in_checker() {
    let tmp = fixture(VALID_MANIFEST);
    write(
        tmp.path(),
        "checkers/demo/helper.py",
        "import requests\n\ndef fetch(url):\n    return requests.get(url)\n",
    );
    let (ok, outcome) = validate(tmp.path());
    assert!(!ok);
    assert_eq!(outcome.errors, 1);
    assert_eq!(
        errors(tmp.path()),
        vec!["forbidden pattern \"requests\" in checkers/demo/helper.py".to_string()]
    );
}

#[test]
fn test_forbidden_pattern_only_applies_to_checkers() {
    let tmp = fixture(VALID_MANIFEST);
    write(
        tmp.path(),
        "sploits/demo/exploit.py",
        "import requests\nrequests.get('http://x')\n",
    );
    let (ok, _) = validate(tmp.path());
    assert!(ok);
}

#[test]
fn test_other_services_are_ignored() {
    let tmp = fixture(VALID_MANIFEST);
    write(tmp.path(), "services/other/docker-compose.yml", "not: [valid\n");
    let (ok, _) = validate(tmp.path());
    assert!(ok);
}
