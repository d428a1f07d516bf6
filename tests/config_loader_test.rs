//! Configuration loading: YAML files, environment overrides and validation.

use std::io::Write;

use courseware::ConfigLoader;
use tempfile::NamedTempFile;

const ENV_KEYS: [&str; 3] = [
    "COURSEWARE_LMS__BASE_URL",
    "COURSEWARE_RECONCILIATION__MAX_POLL_ATTEMPTS",
    "COURSEWARE_LOGGING__LEVEL",
];

fn yaml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

/// Run `f` with every override variable cleared.
fn without_overrides<R>(f: impl FnOnce() -> R) -> R {
    temp_env::with_vars_unset(ENV_KEYS, f)
}

#[test]
fn test_load_from_file_merges_over_defaults() {
    let file = yaml_file(
        r"
lms:
  base_url: https://lms.example.com/
  access_token: secret
reconciliation:
  max_poll_attempts: 5
",
    );

    let config = without_overrides(|| ConfigLoader::load_from_file(file.path())).unwrap();

    assert_eq!(config.lms.normalized_base_url(), "https://lms.example.com");
    assert_eq!(config.lms.access_token.as_deref(), Some("secret"));
    assert_eq!(config.lms.timeout_secs, 30);
    assert_eq!(config.reconciliation.max_poll_attempts, 5);
    assert_eq!(config.reconciliation.poll_delay_ms, 1000);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_environment_overrides_file() {
    let file = yaml_file("reconciliation:\n  max_poll_attempts: 5\n");

    let config = temp_env::with_vars(
        [
            ("COURSEWARE_RECONCILIATION__MAX_POLL_ATTEMPTS", Some("7")),
            ("COURSEWARE_LOGGING__LEVEL", Some("debug")),
            ("COURSEWARE_LMS__BASE_URL", None),
        ],
        || ConfigLoader::load_from_file(file.path()),
    )
    .unwrap();

    assert_eq!(config.reconciliation.max_poll_attempts, 7);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_load_uses_environment_without_project_files() {
    let config = temp_env::with_vars(
        [
            ("COURSEWARE_LMS__BASE_URL", Some("https://courses.example.org")),
            ("COURSEWARE_RECONCILIATION__MAX_POLL_ATTEMPTS", None),
            ("COURSEWARE_LOGGING__LEVEL", None),
        ],
        ConfigLoader::load,
    )
    .unwrap();

    assert_eq!(config.lms.base_url, "https://courses.example.org");
}

#[test]
fn test_missing_file_is_an_error() {
    let result = without_overrides(|| ConfigLoader::load_from_file("/nonexistent/courseware.yaml"));

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "lms:\n  base_url: ftp://lms.example.com\n",
        "lms:\n  timeout_secs: 0\n",
        "reconciliation:\n  max_poll_attempts: 0\n",
        "reconciliation:\n  poll_delay_ms: 120000\n",
        "logging:\n  level: verbose\n",
        "logging:\n  format: xml\n",
        "logging:\n  rotation: weekly\n",
    ];

    for contents in cases {
        let file = yaml_file(contents);
        let result = without_overrides(|| ConfigLoader::load_from_file(file.path()));
        assert!(result.is_err(), "expected rejection for {contents:?}");
    }
}

#[test]
fn test_malformed_yaml_is_an_error() {
    let file = yaml_file("reconciliation: [unclosed\n");

    let result = without_overrides(|| ConfigLoader::load_from_file(file.path()));

    assert!(result.is_err());
}
