use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

use crate::config::PROGRESS_SWEEP_INTERVAL_SECS;

pub const STAGE_COMPLETE: &str = "complete";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub stage: String,
    pub progress: u8,
    pub message: String,
}

impl ProgressSnapshot {
    pub fn new(stage: impl Into<String>, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            progress: progress.min(100),
            message: message.into(),
        }
    }

    pub fn complete() -> Self {
        Self::new(STAGE_COMPLETE, 100, "Test complete")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    NotFound,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressLookup {
    NotFound,
    InProgress(ProgressSnapshot),
    Completed(ProgressSnapshot),
}

impl ProgressLookup {
    pub fn state(&self) -> ProgressState {
        match self {
            ProgressLookup::NotFound => ProgressState::NotFound,
            ProgressLookup::InProgress(_) => ProgressState::InProgress,
            ProgressLookup::Completed(_) => ProgressState::Completed,
        }
    }

    /// Latest snapshot, or the synthetic completed snapshot when the job is
    /// finished or unknown.
    pub fn snapshot(self) -> ProgressSnapshot {
        match self {
            ProgressLookup::InProgress(snapshot) | ProgressLookup::Completed(snapshot) => snapshot,
            ProgressLookup::NotFound => ProgressSnapshot::complete(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub state: ProgressState,
    #[serde(flatten)]
    pub snapshot: ProgressSnapshot,
}

impl From<ProgressLookup> for ProgressView {
    fn from(lookup: ProgressLookup) -> Self {
        Self {
            state: lookup.state(),
            snapshot: lookup.snapshot(),
        }
    }
}

struct TrackedJob {
    snapshot: ProgressSnapshot,
    completed: bool,
    touched: Instant,
}

/// Latest-known progress of running jobs, keyed by job id.
///
/// Entries are bounded by `max_entries` and expire: in-progress entries after
/// `ttl` without a write, completion markers after `completed_ttl`.
pub struct ProgressTracker {
    jobs: RwLock<HashMap<String, TrackedJob>>,
    ttl: Duration,
    completed_ttl: Duration,
    max_entries: usize,
}

impl ProgressTracker {
    pub fn new(ttl: Duration, completed_ttl: Duration, max_entries: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            ttl,
            completed_ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Upsert the latest snapshot. Progress never moves backwards while the
    /// job is running, and writes after `clear` are dropped.
    pub fn set(&self, job_id: &str, snapshot: ProgressSnapshot) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot = ProgressSnapshot::new(snapshot.stage, snapshot.progress, snapshot.message);

        if let Some(existing) = jobs.get(job_id) {
            if existing.completed {
                debug!("Ignoring progress write for finished job {}", job_id);
                return;
            }
            snapshot.progress = snapshot.progress.max(existing.snapshot.progress);
        } else if jobs.len() >= self.max_entries {
            evict_oldest(&mut jobs);
        }

        jobs.insert(
            job_id.to_string(),
            TrackedJob {
                snapshot,
                completed: false,
                touched: Instant::now(),
            },
        );
    }

    pub fn get(&self, job_id: &str) -> ProgressLookup {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        match jobs.get(job_id) {
            Some(job) if job.completed => ProgressLookup::Completed(job.snapshot.clone()),
            Some(job) => ProgressLookup::InProgress(job.snapshot.clone()),
            None => ProgressLookup::NotFound,
        }
    }

    /// Mark the job finished. The entry is kept as a completion marker until
    /// the completion TTL passes.
    pub fn clear(&self, job_id: &str) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if !jobs.contains_key(job_id) && jobs.len() >= self.max_entries {
            evict_oldest(&mut jobs);
        }
        jobs.insert(
            job_id.to_string(),
            TrackedJob {
                snapshot: ProgressSnapshot::complete(),
                completed: true,
                touched: Instant::now(),
            },
        );
    }

    /// Drop expired entries, returning how many were removed.
    pub fn prune_expired(&self) -> usize {
        self.prune_at(Instant::now())
    }

    fn prune_at(&self, now: Instant) -> usize {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|_, job| {
            let limit = if job.completed {
                self.completed_ttl
            } else {
                self.ttl
            };
            now.saturating_duration_since(job.touched) < limit
        });
        before - jobs.len()
    }

    pub fn in_flight(&self) -> usize {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.values().filter(|job| !job.completed).count()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_oldest(jobs: &mut HashMap<String, TrackedJob>) {
    let oldest = jobs
        .iter()
        .min_by_key(|(_, job)| (!job.completed, job.touched))
        .map(|(id, _)| id.clone());
    if let Some(id) = oldest {
        debug!("Progress store full, evicting {}", id);
        jobs.remove(&id);
    }
}

pub fn spawn_progress_sweeper(tracker: Arc<ProgressTracker>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(PROGRESS_SWEEP_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            let removed = tracker.prune_expired();
            if removed > 0 {
                debug!("Pruned {} expired progress entries", removed);
            }
        }
    })
}
