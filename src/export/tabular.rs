use chrono::SecondsFormat;

use super::{Exporter, ReportDocument};

/// One `section,key,value` row per fact, so the file loads into any
/// spreadsheet or dataframe without a schema.
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>> {
        let result = doc.result;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(Vec::new());
        wtr.write_record(["section", "key", "value"])?;

        wtr.write_record(["meta", "title", doc.title()])?;
        if let Some(attribution) = doc.attribution() {
            wtr.write_record(["meta", "attribution", attribution.as_str()])?;
        }
        let generated = doc.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        wtr.write_record(["meta", "generatedAt", generated.as_str()])?;
        if let Some(generator) = doc.generator() {
            wtr.write_record(["meta", "generator", generator])?;
        }

        for (key, value) in [
            ("overall", result.overall.as_str().to_string()),
            ("score", result.score.to_string()),
            ("total", result.summary.total.to_string()),
            ("passed", result.summary.passed.to_string()),
            ("failed", result.summary.failed.to_string()),
            ("warnings", result.summary.warnings.to_string()),
        ] {
            wtr.write_record(["summary", key, value.as_str()])?;
        }

        for (i, issue) in result.issues.iter().enumerate() {
            let n = i + 1;
            for (field, value) in [
                ("severity", issue.severity.as_str()),
                ("category", issue.category.as_str()),
                ("message", issue.message.as_str()),
                ("suggestion", issue.suggestion.as_str()),
            ] {
                let key = format!("{}.{}", n, field);
                wtr.write_record(["issues", key.as_str(), value])?;
            }
        }

        for (i, rec) in result.recommendations.iter().enumerate() {
            let key = (i + 1).to_string();
            wtr.write_record(["recommendations", key.as_str(), rec.as_str()])?;
        }

        for (key, value) in doc.flattened()? {
            if key == "issues" || key.starts_with("issues.") || key.starts_with("recommendations") {
                continue;
            }
            wtr.write_record(["details", key.as_str(), value.as_str()])?;
        }

        wtr.into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush csv: {}", e.error()))
    }
}
