use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credits::CreditOutcome;
use crate::model::{TestMode, TestTarget, TestType};
use crate::result::TestResult;

const AUTO_FIX_CONFIDENCE: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoFixSuggestion {
    pub available: bool,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLinks {
    pub url: String,
    pub download_url: String,
}

impl ReportLinks {
    pub fn for_job(job_id: &str) -> Self {
        Self {
            url: format!("/api/reports/{}", job_id),
            download_url: format!("/api/reports/{}/download?format=pdf", job_id),
        }
    }
}

/// The canonical record of one submitted test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestJob {
    pub id: String,
    pub test_type: TestType,
    pub target: TestTarget,
    pub mode: TestMode,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration: String,
    pub credits_charged: u32,
    pub used_free_test: bool,
    pub results: TestResult,
    pub auto_fix_suggestion: AutoFixSuggestion,
    pub report: ReportLinks,
}

pub struct AssemblyInput {
    pub job_id: String,
    pub test_type: TestType,
    pub target: TestTarget,
    pub mode: TestMode,
    pub credit_outcome: CreditOutcome,
    /// Terminal status; `Failed` when the engine faulted.
    pub status: JobStatus,
    pub result: TestResult,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Merge an engine result with job metadata. Pure, no I/O.
pub fn assemble(input: AssemblyInput) -> TestJob {
    let available = !input.result.issues.is_empty();
    let report = ReportLinks::for_job(&input.job_id);

    TestJob {
        id: input.job_id,
        test_type: input.test_type,
        target: input.target,
        mode: input.mode,
        status: input.status,
        started_at: input.started_at,
        completed_at: input.completed_at,
        duration: format_duration(input.started_at, input.completed_at),
        credits_charged: input.credit_outcome.credits_charged,
        used_free_test: input.credit_outcome.used_free_test,
        results: input.result,
        auto_fix_suggestion: AutoFixSuggestion {
            available,
            confidence: if available { AUTO_FIX_CONFIDENCE } else { 0 },
        },
        report,
    }
}

/// Elapsed seconds with two decimals, e.g. `"3.25s"`. Clock skew clamps to zero.
pub fn format_duration(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> String {
    let millis = (completed_at - started_at).num_milliseconds().max(0);
    format!("{:.2}s", millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input(result: TestResult) -> AssemblyInput {
        let started_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        AssemblyInput {
            job_id: "job-1".to_string(),
            test_type: TestType::Document,
            target: TestTarget::Url {
                url: "https://acme.test".to_string(),
            },
            mode: TestMode::Economy,
            credit_outcome: CreditOutcome {
                used_free_test: false,
                credits_charged: 5,
            },
            status: JobStatus::Completed,
            result,
            started_at,
            completed_at: started_at + chrono::Duration::milliseconds(3254),
        }
    }

    #[test]
    fn test_assemble_copies_metadata() {
        let job = assemble(input(TestResult::not_implemented(TestType::Document)));
        assert_eq!(job.id, "job-1");
        assert_eq!(job.test_type, TestType::Document);
        assert_eq!(job.mode, TestMode::Economy);
        assert_eq!(job.credits_charged, 5);
        assert!(!job.used_free_test);
        assert_eq!(job.duration, "3.25s");
        assert_eq!(job.report.url, "/api/reports/job-1");
        assert_eq!(
            job.report.download_url,
            "/api/reports/job-1/download?format=pdf"
        );
    }

    #[test]
    fn test_auto_fix_follows_issues() {
        let job = assemble(input(TestResult::execution_error("boom")));
        assert!(job.auto_fix_suggestion.available);
        assert_eq!(job.auto_fix_suggestion.confidence, 90);

        let mut clean = TestResult::not_implemented(TestType::Document);
        clean.issues.clear();
        let job = assemble(input(clean));
        assert!(!job.auto_fix_suggestion.available);
        assert_eq!(job.auto_fix_suggestion.confidence, 0);
    }

    #[test]
    fn test_format_duration_clamps_negative() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(format_duration(t, t - chrono::Duration::seconds(2)), "0.00s");
        assert_eq!(format_duration(t, t + chrono::Duration::seconds(61)), "61.00s");
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = assemble(input(TestResult::not_implemented(TestType::Document)));
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["testType"], "document");
        assert_eq!(json["mode"], "economy");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["creditsCharged"], 5);
        assert_eq!(json["usedFreeTest"], false);
        assert_eq!(json["autoFixSuggestion"]["confidence"], 90);
        assert_eq!(json["report"]["downloadUrl"], "/api/reports/job-1/download?format=pdf");
        assert_eq!(json["results"]["overall"], "warning");
    }
}
