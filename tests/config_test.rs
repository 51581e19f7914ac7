use clap::Parser;
use std::path::PathBuf;

use verifyforge::config::*;

#[test]
fn test_defaults() {
    assert_eq!(DEFAULT_PORT, 8787);
    assert_eq!(DEFAULT_FREE_TESTS, 3);
    assert_eq!(DEFAULT_BASE_COST, 10);
    assert_eq!(ENGINE_TIMEOUT_SECS, 120);
}

#[test]
fn test_base_cost_table_covers_every_test_type() {
    use verifyforge::model::TestType;

    for test_type in TestType::ALL {
        assert!(
            BASE_COSTS.iter().any(|(name, _)| *name == test_type.as_str()),
            "{} has no base cost",
            test_type
        );
    }
}

#[test]
fn test_cli_defaults() {
    let args = CliArgs::parse_from(["verifyforge", "--data-dir", "/tmp/vf"]);
    let config = ServiceConfig::from_args(args);

    assert_eq!(config.port, 8787);
    assert_eq!(config.free_tests, 3);
    assert_eq!(config.paid_credits, 0);
    assert_eq!(config.overdraft, OverdraftPolicy::Reject);
    assert_eq!(config.engine_timeout_secs, 120);
    assert_eq!(config.max_links, 20);
    assert!(config.log_dir.is_none());
    assert_eq!(config.data_dir, PathBuf::from("/tmp/vf"));
}

#[test]
fn test_cli_overrides() {
    let args = CliArgs::parse_from([
        "verifyforge",
        "--port",
        "9000",
        "-D",
        "/srv/vf",
        "--free-tests",
        "0",
        "--paid-credits",
        "50",
        "--overdraft",
        "allow-negative",
        "--engine-timeout-secs",
        "30",
        "-l",
        "/var/log/vf",
    ]);
    let config = ServiceConfig::from_args(args);

    assert_eq!(config.port, 9000);
    assert_eq!(config.free_tests, 0);
    assert_eq!(config.paid_credits, 50);
    assert_eq!(config.overdraft, OverdraftPolicy::AllowNegative);
    assert_eq!(config.engine_timeout_secs, 30);
    assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/vf")));
}

#[test]
fn test_cli_rejects_unknown_overdraft() {
    assert!(CliArgs::try_parse_from(["verifyforge", "--overdraft", "sometimes"]).is_err());
}

#[test]
fn test_default_data_dir_is_named_after_service() {
    let config = ServiceConfig::from_args(CliArgs::parse_from(["verifyforge"]));
    assert!(config.data_dir.ends_with("verifyforge"));
}

#[test]
fn test_data_paths() {
    let config = ServiceConfig::from_args(CliArgs::parse_from(["verifyforge", "-D", "/srv/vf"]));
    assert_eq!(config.db_path(), PathBuf::from("/srv/vf/verifyforge.db"));
    assert_eq!(
        config.settings_path(),
        PathBuf::from("/srv/vf/verifyforge-settings.json")
    );
}
