use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use crate::activity::ActivityLog;
use crate::config::{
    ServiceConfig, HTTP_CLIENT_TIMEOUT_SECS, PROGRESS_COMPLETED_TTL_SECS, PROGRESS_MAX_ENTRIES,
    WEB_LINK_TIMEOUT_SECS, WEB_USER_AGENT,
};
use crate::credits::{CreditAccount, CreditLedger};
use crate::engine::{EngineRegistry, WebEngine, WebEngineOptions};
use crate::model::TestType;
use crate::progress::ProgressTracker;
use crate::settings::{load_settings, PersistentSettings};
use crate::store::JobStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: ServiceConfig,
    pub ledger: CreditLedger,
    pub progress: Arc<ProgressTracker>,
    pub registry: EngineRegistry,
    pub store: JobStore,
    pub activity: ActivityLog,
    pub settings: RwLock<PersistentSettings>,
}

impl AppState {
    /// Open the job database and settings file under the data dir and
    /// register the built-in engines.
    pub fn new(config: ServiceConfig) -> anyhow::Result<Self> {
        let store = JobStore::open(&config.db_path())?;
        let registry = default_registry(&config)?;
        Ok(Self::from_parts(config, store, registry))
    }

    pub fn from_parts(config: ServiceConfig, store: JobStore, registry: EngineRegistry) -> Self {
        let settings = load_settings(&config.settings_path());
        let ledger = CreditLedger::new(
            CreditAccount {
                free_tests: config.free_tests,
                paid_credits: config.paid_credits,
            },
            settings.pricing_table(),
            config.overdraft,
        );
        let progress = Arc::new(ProgressTracker::new(
            Duration::from_secs(config.progress_ttl_secs),
            Duration::from_secs(PROGRESS_COMPLETED_TTL_SECS),
            PROGRESS_MAX_ENTRIES,
        ));
        info!(
            "Account starts with {} free tests and {} paid credits (overdraft: {:?})",
            config.free_tests, config.paid_credits, config.overdraft
        );

        Self {
            config,
            ledger,
            progress,
            registry,
            store,
            activity: ActivityLog::new(),
            settings: RwLock::new(settings),
        }
    }
}

pub fn build_http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_CLIENT_TIMEOUT_SECS))
        .user_agent(WEB_USER_AGENT)
        .pool_max_idle_per_host(4)
        .build()?)
}

/// The engines this build ships with. Other test types resolve to the
/// not-implemented result.
pub fn default_registry(config: &ServiceConfig) -> anyhow::Result<EngineRegistry> {
    let web = WebEngine::new(
        build_http_client()?,
        WebEngineOptions {
            max_links: config.max_links,
            link_timeout: Duration::from_secs(WEB_LINK_TIMEOUT_SECS),
        },
    );
    Ok(EngineRegistry::new(Duration::from_secs(config.engine_timeout_secs))
        .with_engine(TestType::Web, Arc::new(web)))
}
