//! Validation and control flow of one test submission: charge, dispatch,
//! assemble, persist.

use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::activity::{ActivityKind, ActivityLevel};
use crate::assembler::{assemble, AssemblyInput, JobStatus, TestJob};
use crate::engine::ProgressCallback;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{TestMode, TestTarget, TestType};
use crate::progress::ProgressSnapshot;
use crate::state::AppState;

pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Raw submission fields as received, before validation.
#[derive(Default)]
pub struct SubmissionForm {
    pub test_type: Option<String>,
    pub target_url: Option<String>,
    pub file: Option<UploadedFile>,
    pub economy_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub test_type: TestType,
    pub target: TestTarget,
    pub mode: TestMode,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SubmissionForm {
    pub fn validate(self) -> ServiceResult<Submission> {
        let test_type = non_empty(self.test_type)
            .ok_or_else(|| ServiceError::Validation("test_type is required".to_string()))?
            .parse::<TestType>()
            .map_err(ServiceError::Validation)?;

        let mode = self
            .economy_mode
            .as_deref()
            .unwrap_or_default()
            .parse::<TestMode>()
            .map_err(ServiceError::Validation)?;

        let target_url = non_empty(self.target_url);
        if test_type == TestType::Web && target_url.is_none() {
            return Err(ServiceError::Validation(
                "target_url is required for web tests".to_string(),
            ));
        }

        let target = match (target_url, self.file) {
            (Some(url), _) => TestTarget::Url {
                url: validate_url(&url)?,
            },
            (None, Some(file)) => file_target(file),
            (None, None) => {
                return Err(ServiceError::Validation(
                    "Either target_url or file is required".to_string(),
                ))
            }
        };

        Ok(Submission {
            test_type,
            target,
            mode,
        })
    }
}

fn validate_url(raw: &str) -> ServiceResult<String> {
    let url = Url::parse(raw)
        .map_err(|e| ServiceError::Validation(format!("Invalid target_url '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ServiceError::Validation(format!(
            "target_url must be http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(url.to_string())
}

/// Describe an upload by name, size, type and digest. The bytes are not kept.
pub fn file_target(file: UploadedFile) -> TestTarget {
    let content_type = file
        .content_type
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .unwrap_or_else(|| {
            mime_guess::from_path(&file.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

    TestTarget::File {
        sha256: hex::encode(Sha256::digest(&file.bytes)),
        size: file.bytes.len() as u64,
        content_type,
        name: file.name,
    }
}

/// Run one validated submission to completion.
///
/// Credit and validation faults return before anything is charged or
/// dispatched. Engine faults still produce a job, with status `failed`.
pub async fn submit(state: &AppState, submission: Submission) -> ServiceResult<TestJob> {
    let Submission {
        test_type,
        target,
        mode,
    } = submission;
    let job_id = Uuid::new_v4().to_string();

    let credit_outcome = match state.ledger.authorize_and_charge(test_type, mode) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Rejected {} test for {}: {}", test_type, target.label(), e);
            state
                .activity
                .record(
                    ActivityKind::Rejected,
                    ActivityLevel::Warn,
                    None,
                    format!("{} test for {} rejected: {}", test_type, target.label(), e),
                )
                .await;
            return Err(e);
        }
    };

    let charge_note = if credit_outcome.used_free_test {
        "free test".to_string()
    } else {
        format!("{} credits", credit_outcome.credits_charged)
    };
    info!(
        "Job {} accepted: {} test ({}) for {}, {}",
        job_id,
        test_type,
        mode,
        target.label(),
        charge_note
    );
    state
        .activity
        .record(
            ActivityKind::Submitted,
            ActivityLevel::Info,
            Some(&job_id),
            format!("{} test submitted for {}", test_type, target.label()),
        )
        .await;
    state
        .activity
        .record(
            ActivityKind::Charged,
            ActivityLevel::Info,
            Some(&job_id),
            format!("Charged {}", charge_note),
        )
        .await;

    let started_at = Utc::now();
    state
        .progress
        .set(&job_id, ProgressSnapshot::new("queued", 0, "Test queued"));

    let tracker = Arc::clone(&state.progress);
    let progress_id = job_id.clone();
    let callback: ProgressCallback =
        Arc::new(move |snapshot: ProgressSnapshot| tracker.set(&progress_id, snapshot));

    let outcome = state
        .registry
        .dispatch(test_type, target.clone(), callback)
        .await;
    let status = if outcome.is_failure() {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    };

    let job = assemble(AssemblyInput {
        job_id: job_id.clone(),
        test_type,
        target,
        mode,
        credit_outcome,
        status,
        result: outcome.into_result(),
        started_at,
        completed_at: Utc::now(),
    });
    state.progress.clear(&job_id);

    // The charge stands and the test has run, so the caller still gets the job.
    if let Err(e) = state.store.insert(&job) {
        warn!("Job {} ran but could not be saved: {}", job.id, e);
        state
            .activity
            .record(
                ActivityKind::Failed,
                ActivityLevel::Warn,
                Some(&job.id),
                format!("Job record not saved: {}", e),
            )
            .await;
    }

    let (kind, level) = match status {
        JobStatus::Failed => (ActivityKind::Failed, ActivityLevel::Error),
        _ => (ActivityKind::Completed, ActivityLevel::Info),
    };
    info!(
        "Job {} {}: {} (score {}) in {}",
        job.id,
        status.as_str(),
        job.results.overall.as_str(),
        job.results.score,
        job.duration
    );
    state
        .activity
        .record(
            kind,
            level,
            Some(&job.id),
            format!(
                "{} test {}: {} with score {}",
                test_type,
                status.as_str(),
                job.results.overall.as_str(),
                job.results.score
            ),
        )
        .await;

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(test_type: &str, url: Option<&str>) -> SubmissionForm {
        SubmissionForm {
            test_type: Some(test_type.to_string()),
            target_url: url.map(str::to_string),
            ..Default::default()
        }
    }

    fn upload(name: &str, content_type: Option<&str>) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from_static(b"hello"),
        }
    }

    #[test]
    fn test_validate_web_submission() {
        let submission = form("web", Some("https://acme.test")).validate().unwrap();
        assert_eq!(submission.test_type, TestType::Web);
        assert_eq!(submission.mode, TestMode::Standard);
        assert_eq!(submission.target.url(), Some("https://acme.test/"));
    }

    #[test]
    fn test_missing_test_type() {
        let err = SubmissionForm::default().validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("test_type")));

        let err = form("  ", Some("https://acme.test")).validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_unknown_test_type() {
        let err = form("desktop", Some("https://acme.test")).validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("desktop")));
    }

    #[test]
    fn test_web_requires_url() {
        let mut f = form("web", None);
        f.file = Some(upload("site.zip", None));
        let err = f.validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("web")));
    }

    #[test]
    fn test_target_required() {
        let err = form("api", None).validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("target_url or file")));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = form("api", Some("ftp://acme.test/x")).validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("http")));
        assert!(form("api", Some("not a url")).validate().is_err());
    }

    #[test]
    fn test_mode_parsing() {
        let mut f = form("api", Some("https://acme.test"));
        f.economy_mode = Some("ultra-economy".to_string());
        assert_eq!(f.validate().unwrap().mode, TestMode::UltraEconomy);

        let mut f = form("api", Some("https://acme.test"));
        f.economy_mode = Some("cheap".to_string());
        assert!(matches!(f.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_file_target_fingerprint() {
        let target = file_target(upload("report.pdf", None));
        assert_eq!(
            target,
            TestTarget::File {
                name: "report.pdf".to_string(),
                size: 5,
                content_type: "application/pdf".to_string(),
                sha256: "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
                    .to_string(),
            }
        );
    }

    #[test]
    fn test_file_target_keeps_declared_type() {
        let target = file_target(upload("blob", Some("text/csv")));
        assert!(matches!(target, TestTarget::File { ref content_type, .. } if content_type == "text/csv"));
    }

    #[test]
    fn test_url_preferred_over_file() {
        let mut f = form("document", Some("https://acme.test/doc"));
        f.file = Some(upload("doc.pdf", None));
        let submission = f.validate().unwrap();
        assert_eq!(submission.target.url(), Some("https://acme.test/doc"));
    }
}
