//! Test engines and the registry that dispatches to them.
//!
//! [`EngineRegistry::execute`] never fails: unregistered test types and
//! engine faults (errors, panics, timeouts) are rendered into a
//! [`TestResult`] of the same shape as a real engine result.

pub mod html;
pub mod web;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::model::{TestTarget, TestType};
use crate::progress::ProgressSnapshot;
use crate::result::TestResult;

pub use web::{WebEngine, WebEngineOptions};

/// Receives progress snapshots while an engine runs.
pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// A test engine for one test type.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, target: &TestTarget, progress: ProgressCallback)
        -> anyhow::Result<TestResult>;
}

/// How a dispatch ended, before rendering into a [`TestResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    Completed(TestResult),
    NotImplemented(TestType),
    Failed(String),
}

impl EngineOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, EngineOutcome::Failed(_))
    }

    pub fn into_result(self) -> TestResult {
        match self {
            EngineOutcome::Completed(result) => result.normalized(),
            EngineOutcome::NotImplemented(test_type) => TestResult::not_implemented(test_type),
            EngineOutcome::Failed(message) => TestResult::execution_error(message),
        }
    }
}

pub struct EngineRegistry {
    engines: HashMap<TestType, Arc<dyn Engine>>,
    timeout: Duration,
}

impl EngineRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            engines: HashMap::new(),
            timeout,
        }
    }

    pub fn with_engine(mut self, test_type: TestType, engine: Arc<dyn Engine>) -> Self {
        self.register(test_type, engine);
        self
    }

    pub fn register(&mut self, test_type: TestType, engine: Arc<dyn Engine>) {
        debug!("Registering {} engine for {} tests", engine.name(), test_type);
        self.engines.insert(test_type, engine);
    }

    pub fn is_registered(&self, test_type: TestType) -> bool {
        self.engines.contains_key(&test_type)
    }

    /// Registered test types in declaration order.
    pub fn registered(&self) -> Vec<TestType> {
        TestType::ALL
            .into_iter()
            .filter(|t| self.engines.contains_key(t))
            .collect()
    }

    /// Run the engine for `test_type` on its own task, bounded by the
    /// registry timeout.
    pub async fn dispatch(
        &self,
        test_type: TestType,
        target: TestTarget,
        progress: ProgressCallback,
    ) -> EngineOutcome {
        let Some(engine) = self.engines.get(&test_type).cloned() else {
            debug!("No engine registered for {} tests", test_type);
            return EngineOutcome::NotImplemented(test_type);
        };

        let task = tokio::spawn(async move { engine.run(&target, progress).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(result))) => EngineOutcome::Completed(result),
            Ok(Ok(Err(e))) => {
                warn!("{} engine failed: {:#}", test_type, e);
                EngineOutcome::Failed(format!("{:#}", e))
            }
            Ok(Err(join_err)) => {
                warn!("{} engine task aborted: {}", test_type, join_err);
                let message = if join_err.is_panic() {
                    "engine crashed while running the test".to_string()
                } else {
                    "engine task was cancelled".to_string()
                };
                EngineOutcome::Failed(message)
            }
            Err(_) => {
                abort.abort();
                warn!(
                    "{} engine timed out after {}s",
                    test_type,
                    self.timeout.as_secs()
                );
                EngineOutcome::Failed(format!(
                    "test timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            }
        }
    }

    pub async fn execute(
        &self,
        test_type: TestType,
        target: TestTarget,
        progress: ProgressCallback,
    ) -> TestResult {
        self.dispatch(test_type, target, progress)
            .await
            .into_result()
    }
}
