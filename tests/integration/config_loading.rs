// tests/integration/config_loading.rs - Configuration files, environment overrides and planning

use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;

use seedcheck::{Config, HarnessError, HarnessSummary, Orchestrator, RunMode};

use crate::helpers::test_data::standard_dataset;

fn example_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seedcheck.example.toml")
}

#[test]
#[serial]
fn test_example_config_matches_builtin_presets() {
    let config = Config::load(Some(&example_config_path())).unwrap();
    let sample = Config::sample();

    let names: Vec<&str> = config.backends.iter().map(|b| b.name.as_str()).collect();
    let expected: Vec<&str> = sample.backends.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, expected);

    for (loaded, preset) in config.backends.iter().zip(&sample.backends) {
        assert_eq!(loaded.kind, preset.kind, "backend {}", loaded.name);
        assert_eq!(loaded.mode, preset.mode, "backend {}", loaded.name);
        assert_eq!(loaded.settings, preset.settings, "backend {}", loaded.name);
    }

    let adf = config.backends.iter().find(|b| b.name == "adf-blob-to-mongo").unwrap();
    assert_eq!(adf.mode, RunMode::VerifyOnly);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_environment_overrides_file_values() {
    std::env::set_var("SEEDCHECK_HARNESS__MAX_CONCURRENCY", "7");
    std::env::set_var("SEEDCHECK_HARNESS__PAGE_SIZE", "3");
    let loaded = Config::load(Some(&example_config_path()));
    std::env::remove_var("SEEDCHECK_HARNESS__MAX_CONCURRENCY");
    std::env::remove_var("SEEDCHECK_HARNESS__PAGE_SIZE");

    let config = loaded.unwrap();
    assert_eq!(config.harness.max_concurrency, 7);
    assert_eq!(config.harness.page_size, 3);
    assert_eq!(config.harness.step_timeout_seconds, 30);
}

#[test]
#[serial]
fn test_no_file_yields_defaults() {
    let config = Config::load(None).unwrap();
    assert!(config.backends.is_empty());
    assert_eq!(config.harness.max_concurrency, 4);
    assert_eq!(config.harness.page_size, 100);
}

#[test]
#[serial]
fn test_malformed_file_is_a_config_error() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[harness]\nmax_concurrency = \"many\"").unwrap();

    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, HarnessError::Config(_)));
}

#[tokio::test]
#[serial]
async fn test_json_config_runs_end_to_end() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
  "harness": {{ "max_concurrency": 2, "page_size": 2 }},
  "backends": [
    {{
      "name": "lake",
      "kind": "data_lake",
      "transport": "memory",
      "settings": {{
        "account_name": "devstoreaccount1",
        "account_key": "key",
        "filesystem_name": "landing",
        "directory_name": "people"
      }}
    }},
    {{
      "name": "cache",
      "kind": "key_value",
      "transport": "memory",
      "settings": {{ "connection_string": "localhost", "key_prefix": "people:" }}
    }}
  ]
}}"#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert!(config.validate_detailed().success);

    let plans = Orchestrator::plan(&config);
    let summary = HarnessSummary::new(
        Orchestrator::new(standard_dataset())
            .run_all(plans, config.harness.max_concurrency)
            .await,
    );
    assert!(summary.all_clean(), "{}", summary.render());
    assert_eq!(summary.final_message(), "OK: 2 backends verified");
}

#[test]
#[serial]
fn test_live_example_requires_a_live_capable_kind() {
    let mut config = Config::load(Some(&example_config_path())).unwrap();
    config.backends[0].transport = "live".into();

    let result = config.validate_detailed();
    assert!(!result.success);
    let error = result
        .errors
        .iter()
        .find(|e| e.error_type == "live_transport_unavailable")
        .unwrap();
    assert_eq!(error.field, "backends[0].transport");
    assert!(error.suggested_fix.as_deref().unwrap().contains("--simulate"));
}
