use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::assembler::TestJob;
use crate::error::{ServiceError, ServiceResult};

/// Completed jobs, one row per job with the full record as JSON.
pub struct JobStore {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub test_type: String,
    pub target: String,
    pub status: String,
    pub overall: String,
    pub score: i64,
    pub started_at: String,
}

impl JobStore {
    pub fn open(path: &Path) -> ServiceResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceError::Internal(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> ServiceResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> ServiceResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> ServiceResult<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                test_type TEXT NOT NULL,
                target TEXT NOT NULL,
                status TEXT NOT NULL,
                overall TEXT NOT NULL,
                score INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                record_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_started ON jobs(started_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_type ON jobs(test_type);
        ",
        )?;
        Ok(())
    }

    /// Jobs are immutable once stored; inserting an existing id is an error.
    pub fn insert(&self, job: &TestJob) -> ServiceResult<()> {
        let record = serde_json::to_string(job)
            .map_err(|e| ServiceError::Internal(format!("Failed to serialize job: {}", e)))?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO jobs (id, test_type, target, status, overall, score, started_at, completed_at, record_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.test_type.as_str(),
                job.target.label(),
                job.status.as_str(),
                job.results.overall.as_str(),
                job.results.score,
                job.started_at.to_rfc3339(),
                job.completed_at.to_rfc3339(),
                record,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> ServiceResult<Option<TestJob>> {
        let conn = self.conn();
        let record: Option<String> = conn
            .query_row(
                "SELECT record_json FROM jobs WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match record {
            Some(json) => match serde_json::from_str(&json) {
                Ok(job) => Ok(Some(job)),
                Err(e) => {
                    warn!("Stored job {} is unreadable: {}", id, e);
                    Err(ServiceError::Internal(format!(
                        "Stored job {} is unreadable",
                        id
                    )))
                }
            },
            None => Ok(None),
        }
    }

    pub fn recent(&self, limit: usize) -> ServiceResult<Vec<JobSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, test_type, target, status, overall, score, started_at
             FROM jobs ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(JobSummary {
                    id: row.get(0)?,
                    test_type: row.get(1)?,
                    target: row.get(2)?,
                    status: row.get(3)?,
                    overall: row.get(4)?,
                    score: row.get(5)?,
                    started_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{assemble, AssemblyInput, JobStatus};
    use crate::credits::CreditOutcome;
    use crate::model::{TestMode, TestTarget, TestType};
    use crate::result::TestResult;
    use chrono::{Duration, Utc};

    fn job(id: &str, offset_secs: i64) -> TestJob {
        let started_at = Utc::now() + Duration::seconds(offset_secs);
        assemble(AssemblyInput {
            job_id: id.to_string(),
            test_type: TestType::Api,
            target: TestTarget::Url {
                url: "https://api.acme.test".to_string(),
            },
            mode: TestMode::Standard,
            credit_outcome: CreditOutcome {
                used_free_test: true,
                credits_charged: 0,
            },
            status: JobStatus::Completed,
            result: TestResult::not_implemented(TestType::Api),
            started_at,
            completed_at: started_at + Duration::milliseconds(10),
        })
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let store = JobStore::open_in_memory().unwrap();
        let original = job("a", 0);
        store.insert(&original).unwrap();
        let loaded = store.get("a").unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = JobStore::open_in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = JobStore::open_in_memory().unwrap();
        store.insert(&job("a", 0)).unwrap();
        assert!(store.insert(&job("a", 5)).is_err());
    }

    #[test]
    fn test_recent_newest_first() {
        let store = JobStore::open_in_memory().unwrap();
        store.insert(&job("old", -60)).unwrap();
        store.insert(&job("new", 0)).unwrap();
        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "new");
        assert_eq!(recent[0].overall, "warning");
        assert_eq!(store.recent(1).unwrap().len(), 1);
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("jobs.db");
        let store = JobStore::open(&path).unwrap();
        store.insert(&job("a", 0)).unwrap();
        assert!(path.exists());
    }
}
