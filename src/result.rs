//! Canonical, engine-agnostic test result.
//!
//! Every engine outcome, including stubs for unregistered test types and
//! engine faults, is rendered into [`TestResult`] with all detail blocks
//! present, so the assembler and exporters never see a partial shape.

use serde::{Deserialize, Serialize};

use crate::model::TestType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Pass,
    Fail,
    Warning,
}

impl Overall {
    pub fn as_str(&self) -> &'static str {
        match self {
            Overall::Pass => "pass",
            Overall::Fail => "fail",
            Overall::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Points taken off a perfect score.
    pub fn penalty(&self) -> u8 {
        match self {
            Severity::Low => 5,
            Severity::Medium => 10,
            Severity::High => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub warnings: u32,
}

impl Summary {
    fn counted(&self) -> u64 {
        u64::from(self.passed) + u64::from(self.failed) + u64::from(self.warnings)
    }

    pub fn is_consistent(&self) -> bool {
        self.counted() <= u64::from(self.total)
    }

    /// Raise `total` so that passed + failed + warnings never exceeds it.
    pub fn normalized(self) -> Self {
        let counted = u32::try_from(self.counted()).unwrap_or(u32::MAX);
        Summary {
            total: self.total.max(counted),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: String,
    pub message: String,
    pub suggestion: String,
}

impl Issue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub status_code: u16,
    pub ttfb_ms: f64,
    pub load_time_ms: f64,
    pub page_size_bytes: u64,
    pub compressed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureAnalysis {
    pub title: Option<String>,
    pub has_meta_description: bool,
    pub has_viewport: bool,
    pub has_lang: bool,
    pub h1_count: u32,
    pub heading_count: u32,
    pub image_count: u32,
    pub images_missing_alt: u32,
    pub form_count: u32,
    pub script_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAnalysis {
    pub total: u32,
    pub internal: u32,
    pub external: u32,
    pub checked: u32,
    pub broken: Vec<BrokenLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityHeaders {
    pub https: bool,
    pub hsts: bool,
    pub content_security_policy: bool,
    pub x_content_type_options: bool,
    pub x_frame_options: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub overall: Overall,
    pub score: u8,
    pub summary: Summary,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub performance: PerformanceMetrics,
    #[serde(default)]
    pub structure: StructureAnalysis,
    #[serde(default)]
    pub links: LinkAnalysis,
    #[serde(default)]
    pub security: SecurityHeaders,
}

impl TestResult {
    /// Result for a test type no engine is registered for.
    pub fn not_implemented(test_type: TestType) -> Self {
        Self {
            overall: Overall::Warning,
            score: 0,
            summary: Summary {
                total: 1,
                passed: 0,
                failed: 0,
                warnings: 1,
            },
            issues: vec![Issue::new(
                Severity::Medium,
                "engine",
                format!("{} testing is not yet implemented", test_type),
                "Run a web test, or resubmit once this test type is available",
            )],
            recommendations: vec![format!(
                "{} tests are not available yet; no checks were run against the target",
                test_type
            )],
            performance: PerformanceMetrics::default(),
            structure: StructureAnalysis::default(),
            links: LinkAnalysis::default(),
            security: SecurityHeaders::default(),
        }
    }

    /// Result for an engine that errored, panicked or timed out.
    pub fn execution_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            overall: Overall::Fail,
            score: 0,
            summary: Summary {
                total: 1,
                passed: 0,
                failed: 1,
                warnings: 0,
            },
            issues: vec![Issue::new(
                Severity::High,
                "execution",
                format!("Test execution failed: {}", message),
                "Check that the target is reachable and try again",
            )],
            recommendations: vec![
                "Verify the target is online and accessible, then resubmit the test".to_string(),
            ],
            performance: PerformanceMetrics::default(),
            structure: StructureAnalysis::default(),
            links: LinkAnalysis::default(),
            security: SecurityHeaders::default(),
        }
    }

    pub fn normalized(mut self) -> Self {
        self.summary = self.summary.normalized();
        self.score = self.score.min(100);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_implemented_shape() {
        let result = TestResult::not_implemented(TestType::Game);
        assert_eq!(result.overall, Overall::Warning);
        assert_eq!(
            result.summary,
            Summary {
                total: 1,
                passed: 0,
                failed: 0,
                warnings: 1
            }
        );
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Medium);
        assert!(result.issues[0].message.contains("not yet implemented"));
        assert_eq!(result.performance, PerformanceMetrics::default());
        assert!(result.summary.is_consistent());
    }

    #[test]
    fn test_execution_error_shape() {
        let result = TestResult::execution_error("connection refused");
        assert_eq!(result.overall, Overall::Fail);
        assert_eq!(result.score, 0);
        assert_eq!(
            result.summary,
            Summary {
                total: 1,
                passed: 0,
                failed: 1,
                warnings: 0
            }
        );
        assert_eq!(result.issues[0].severity, Severity::High);
        assert!(result.issues[0].message.contains("connection refused"));
        assert!(result.links.broken.is_empty());
    }

    #[test]
    fn test_summary_normalization_raises_total() {
        let summary = Summary {
            total: 2,
            passed: 2,
            failed: 1,
            warnings: 1,
        };
        assert!(!summary.is_consistent());
        let fixed = summary.normalized();
        assert_eq!(fixed.total, 4);
        assert!(fixed.is_consistent());
    }

    #[test]
    fn test_summary_counts_near_u32_max() {
        let summary = Summary {
            total: u32::MAX,
            passed: u32::MAX,
            failed: 1,
            warnings: 0,
        };
        assert!(!summary.is_consistent());
        assert_eq!(summary.normalized().total, u32::MAX);
    }

    #[test]
    fn test_detail_blocks_default_when_missing() {
        let json = r#"{
            "overall": "pass",
            "score": 100,
            "summary": {"total": 1, "passed": 1, "failed": 0, "warnings": 0},
            "issues": [],
            "recommendations": []
        }"#;
        let result: TestResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.structure, StructureAnalysis::default());
        assert_eq!(result.security, SecurityHeaders::default());
    }
}
