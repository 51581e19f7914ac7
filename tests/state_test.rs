use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

use verifyforge::config::{OverdraftPolicy, ServiceConfig};
use verifyforge::model::{TestMode, TestType};
use verifyforge::settings::{save_settings, PersistentSettings};
use verifyforge::state::{default_registry, AppState};
use verifyforge::store::JobStore;

fn test_config(dir: &Path) -> ServiceConfig {
    ServiceConfig {
        port: 0,
        data_dir: dir.to_path_buf(),
        free_tests: 2,
        paid_credits: 15,
        overdraft: OverdraftPolicy::AllowNegative,
        engine_timeout_secs: 5,
        progress_ttl_secs: 60,
        max_links: 5,
        log_dir: None,
    }
}

#[tokio::test]
async fn test_state_creation() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let registry = default_registry(&config).unwrap();
    let state = AppState::from_parts(config, JobStore::open_in_memory().unwrap(), registry);

    let balance = state.ledger.balance();
    assert_eq!(balance.free_tests, 2);
    assert_eq!(balance.paid_credits, 15);
    assert_eq!(balance.total, 17);
    assert_eq!(state.ledger.overdraft(), OverdraftPolicy::AllowNegative);

    assert!(state.progress.is_empty());
    assert!(state.activity.history().await.is_empty());
    assert_eq!(state.registry.registered(), vec![TestType::Web]);
    assert_eq!(*state.settings.read().await, PersistentSettings::default());
}

#[tokio::test]
async fn test_state_loads_persisted_pricing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    save_settings(
        &config.settings_path(),
        &PersistentSettings {
            pricing: Some(BTreeMap::from([("game".to_string(), 30)])),
            ..Default::default()
        },
    )
    .unwrap();

    let registry = default_registry(&config).unwrap();
    let state = AppState::from_parts(config, JobStore::open_in_memory().unwrap(), registry);
    assert_eq!(state.ledger.quote(TestType::Game, TestMode::Standard), 30);
    assert_eq!(state.ledger.quote(TestType::Game, TestMode::UltraEconomy), 12);
}

#[test]
fn test_new_opens_database_in_data_dir() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir.path().join("data"));
    let db_path = config.db_path();
    let _state = AppState::new(config).unwrap();
    assert!(db_path.exists());
}
