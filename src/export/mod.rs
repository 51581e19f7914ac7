//! Report export: one canonical [`TestResult`], eight document formats.
//!
//! Every encoder renders the same [`ReportDocument`] projection, so the
//! formats never disagree on what a report contains. The only impure input
//! is the "generated at" timestamp; [`export_at`] takes it explicitly.

mod markup;
mod office;
mod pdf;
mod tabular;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::{DEFAULT_REPORT_TITLE, REPORT_GENERATOR};
use crate::error::ServiceError;
use crate::result::TestResult;

pub use markup::{HtmlExporter, JsonExporter, MarkdownExporter, TextExporter};
pub use office::{ExcelExporter, WordExporter};
pub use pdf::PdfExporter;
pub use tabular::CsvExporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Word,
    Markdown,
    Excel,
    Csv,
    Json,
    Html,
    Text,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 8] = [
        ReportFormat::Pdf,
        ReportFormat::Word,
        ReportFormat::Markdown,
        ReportFormat::Excel,
        ReportFormat::Csv,
        ReportFormat::Json,
        ReportFormat::Html,
        ReportFormat::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Word => "word",
            ReportFormat::Markdown => "markdown",
            ReportFormat::Excel => "excel",
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
            ReportFormat::Text => "text",
        }
    }

    pub fn exporter(&self) -> &'static dyn Exporter {
        match self {
            ReportFormat::Pdf => &PdfExporter,
            ReportFormat::Word => &WordExporter,
            ReportFormat::Markdown => &MarkdownExporter,
            ReportFormat::Excel => &ExcelExporter,
            ReportFormat::Csv => &CsvExporter,
            ReportFormat::Json => &JsonExporter,
            ReportFormat::Html => &HtmlExporter,
            ReportFormat::Text => &TextExporter,
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ReportFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == needle)
            .ok_or_else(|| ServiceError::UnsupportedFormat(s.to_string()))
    }
}

/// Presentation options. Unset fields fall back to persisted defaults, then
/// to the built-in ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_charts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_label: Option<bool>,
}

impl ReportConfig {
    /// Fill unset fields from `defaults`.
    pub fn merged_over(self, defaults: &ReportConfig) -> ReportConfig {
        ReportConfig {
            title: self.title.or_else(|| defaults.title.clone()),
            company_name: self.company_name.or_else(|| defaults.company_name.clone()),
            logo: self.logo.or_else(|| defaults.logo.clone()),
            include_charts: self.include_charts.or(defaults.include_charts),
            white_label: self.white_label.or(defaults.white_label),
        }
    }

    pub fn title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_REPORT_TITLE)
    }

    pub fn include_charts(&self) -> bool {
        self.include_charts.unwrap_or(false)
    }

    pub fn white_label(&self) -> bool {
        self.white_label.unwrap_or(false)
    }

    pub fn logo(&self) -> Option<&str> {
        self.logo.as_deref().filter(|l| !l.trim().is_empty())
    }

    /// Only rendered for white-labelled reports with a company name.
    pub fn attribution(&self) -> Option<String> {
        let company = self
            .company_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())?;
        self.white_label()
            .then(|| format!("Prepared by {}", company))
    }
}

/// The format-independent projection every encoder renders.
pub struct ReportDocument<'a> {
    pub result: &'a TestResult,
    pub config: &'a ReportConfig,
    pub generated_at: DateTime<Utc>,
}

pub struct Section {
    pub heading: &'static str,
    pub lines: Vec<String>,
}

impl<'a> ReportDocument<'a> {
    pub fn title(&self) -> &str {
        self.config.title()
    }

    pub fn attribution(&self) -> Option<String> {
        self.config.attribution()
    }

    pub fn generated_line(&self) -> String {
        format!(
            "Generated at {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    pub fn generator(&self) -> Option<&'static str> {
        (!self.config.white_label()).then_some(REPORT_GENERATOR)
    }

    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let r = self.result;
        vec![
            ("Overall", r.overall.as_str().to_uppercase()),
            ("Score", format!("{}/100", r.score)),
            ("Total checks", r.summary.total.to_string()),
            ("Passed", r.summary.passed.to_string()),
            ("Failed", r.summary.failed.to_string()),
            ("Warnings", r.summary.warnings.to_string()),
        ]
    }

    /// Full structured dump of the result.
    pub fn dump(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self.result)?)
    }

    /// Leaf values of the result keyed by dotted path, e.g. `issues.0.message`.
    pub fn flattened(&self) -> anyhow::Result<Vec<(String, String)>> {
        let value = serde_json::to_value(self.result)?;
        let mut out = Vec::new();
        flatten_value("", &value, &mut out);
        Ok(out)
    }

    /// Plain-text sections shared by the text, pdf and word encoders.
    pub fn sections(&self) -> anyhow::Result<Vec<Section>> {
        let summary = self
            .summary_rows()
            .into_iter()
            .map(|(k, v)| format!("{:<14}{}", format!("{}:", k), v))
            .collect();

        let issues = if self.result.issues.is_empty() {
            vec!["No issues found.".to_string()]
        } else {
            self.result
                .issues
                .iter()
                .enumerate()
                .flat_map(|(i, issue)| {
                    [
                        format!(
                            "{}. [{}] {}: {}",
                            i + 1,
                            issue.severity.as_str().to_uppercase(),
                            issue.category,
                            issue.message
                        ),
                        format!("   Suggestion: {}", issue.suggestion),
                    ]
                })
                .collect()
        };

        let recommendations = self
            .result
            .recommendations
            .iter()
            .map(|r| format!("- {}", r))
            .collect();

        let details = self.dump()?.lines().map(str::to_string).collect();

        Ok(vec![
            Section {
                heading: "Summary",
                lines: summary,
            },
            Section {
                heading: "Issues",
                lines: issues,
            },
            Section {
                heading: "Recommendations",
                lines: recommendations,
            },
            Section {
                heading: "Details",
                lines: details,
            },
        ])
    }
}

fn flatten_value(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    use serde_json::Value;

    let key = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{}.{}", prefix, k)
        }
    };

    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_value(&key(k), v, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, v) in items.iter().enumerate() {
                flatten_value(&key(&i.to_string()), v, out);
            }
        }
        Value::Array(_) => out.push((prefix.to_string(), String::new())),
        Value::Null => out.push((prefix.to_string(), String::new())),
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

/// A format encoder.
pub trait Exporter: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn extension(&self) -> &'static str;
    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct ExportedReport {
    pub format: ReportFormat,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

pub fn export(
    result: &TestResult,
    format: ReportFormat,
    config: &ReportConfig,
) -> Result<ExportedReport, ServiceError> {
    export_at(result, format, config, Utc::now())
}

pub fn export_at(
    result: &TestResult,
    format: ReportFormat,
    config: &ReportConfig,
    generated_at: DateTime<Utc>,
) -> Result<ExportedReport, ServiceError> {
    let exporter = format.exporter();
    let doc = ReportDocument {
        result,
        config,
        generated_at,
    };
    let bytes = exporter
        .render(&doc)
        .map_err(|e| ServiceError::Export(format!("{} export failed: {:#}", format, e)))?;

    Ok(ExportedReport {
        format,
        bytes,
        content_type: exporter.content_type(),
        file_name: format!(
            "{}-{}.{}",
            slugify(config.title()),
            generated_at.format("%Y%m%d-%H%M%S"),
            exporter.extension()
        ),
    })
}

fn slugify(title: &str) -> String {
    let slug = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "report".to_string()
    } else {
        slug
    }
}
