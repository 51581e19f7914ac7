use chrono::SecondsFormat;
use serde_json::json;
use std::fmt::Write as _;

use super::{Exporter, ReportDocument};
use crate::result::TestResult;

pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>> {
        let mut meta = json!({
            "title": doc.title(),
            "generatedAt": doc.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "whiteLabel": doc.config.white_label(),
            "includeCharts": doc.config.include_charts(),
        });
        if let Some(generator) = doc.generator() {
            meta["generator"] = json!(generator);
        }
        if let Some(company) = &doc.config.company_name {
            meta["companyName"] = json!(company);
        }
        if let Some(attribution) = doc.attribution() {
            meta["attribution"] = json!(attribution);
        }
        if let Some(logo) = doc.config.logo() {
            meta["logo"] = json!(logo);
        }

        let body = json!({ "meta": meta, "results": doc.result });
        let mut bytes = serde_json::to_vec_pretty(&body)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

pub struct TextExporter;

impl Exporter for TextExporter {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>> {
        let mut out = String::new();
        let title = doc.title();
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "{}", "=".repeat(title.chars().count()));
        if let Some(attribution) = doc.attribution() {
            let _ = writeln!(out, "{}", attribution);
        }
        let _ = writeln!(out, "{}", doc.generated_line());

        for section in doc.sections()? {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", section.heading);
            let _ = writeln!(out, "{}", "-".repeat(section.heading.len()));
            for line in &section.lines {
                let _ = writeln!(out, "{}", line);
            }
        }

        if let Some(generator) = doc.generator() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Generated by {}", generator);
        }
        Ok(out.into_bytes())
    }
}

pub struct MarkdownExporter;

fn md_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

impl Exporter for MarkdownExporter {
    fn content_type(&self) -> &'static str {
        "text/markdown; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>> {
        let result = doc.result;
        let mut out = String::new();

        let _ = writeln!(out, "# {}\n", doc.title());
        if let Some(attribution) = doc.attribution() {
            let _ = writeln!(out, "_{}_\n", attribution);
        }
        let _ = writeln!(out, "{}\n", doc.generated_line());

        let _ = writeln!(out, "## Summary\n");
        let _ = writeln!(out, "| Metric | Value |");
        let _ = writeln!(out, "|---|---|");
        for (key, value) in doc.summary_rows() {
            let _ = writeln!(out, "| {} | {} |", key, value);
        }

        let _ = writeln!(out, "\n## Issues\n");
        if result.issues.is_empty() {
            let _ = writeln!(out, "No issues found.");
        } else {
            let _ = writeln!(out, "| # | Severity | Category | Message | Suggestion |");
            let _ = writeln!(out, "|---|---|---|---|---|");
            for (i, issue) in result.issues.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    i + 1,
                    issue.severity.as_str(),
                    md_cell(&issue.category),
                    md_cell(&issue.message),
                    md_cell(&issue.suggestion)
                );
            }
        }

        if !result.recommendations.is_empty() {
            let _ = writeln!(out, "\n## Recommendations\n");
            for rec in &result.recommendations {
                let _ = writeln!(out, "- {}", rec);
            }
        }

        let _ = writeln!(out, "\n## Details\n");
        let _ = writeln!(out, "```json\n{}\n```", doc.dump()?);

        if let Some(generator) = doc.generator() {
            let _ = writeln!(out, "\n---\n\n_Generated by {}_", generator);
        }
        Ok(out.into_bytes())
    }
}

pub struct HtmlExporter;

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Logos are only embedded from web or inline image sources.
fn safe_logo(logo: &str) -> Option<&str> {
    let lower = logo.trim().to_ascii_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://") || lower.starts_with("data:image/"))
        .then_some(logo.trim())
}

const STYLE: &str = "body{font-family:-apple-system,Segoe UI,Helvetica,Arial,sans-serif;margin:2rem auto;max-width:960px;color:#1f2933}\
h1{margin-bottom:.25rem}\
.meta{color:#616e7c;margin:.25rem 0}\
.logo{max-height:64px;float:right}\
table{border-collapse:collapse;width:100%;margin:1rem 0}\
th,td{border:1px solid #d9e2ec;padding:.4rem .6rem;text-align:left;vertical-align:top}\
th{background:#f0f4f8}\
.overall-pass{color:#2f8132}.overall-warning{color:#b44d12}.overall-fail{color:#ab091e}\
.sev-high{color:#ab091e;font-weight:600}.sev-medium{color:#b44d12}.sev-low{color:#616e7c}\
.chart{margin:1rem 0}.bar{height:1.1rem;margin:.2rem 0;color:#fff;font-size:.75rem;padding-left:.3rem;box-sizing:border-box;min-width:2rem}\
.bar-passed{background:#3f9142}.bar-failed{background:#cf1124}.bar-warnings{background:#de911d}.bar-score{background:#2680c2}\
pre{background:#f5f7fa;padding:1rem;overflow:auto;font-size:.8rem}\
footer{color:#9aa5b1;font-size:.8rem;margin-top:2rem}";

fn chart(out: &mut String, result: &TestResult) {
    let total = u64::from(result.summary.total.max(1));
    let pct = |n: u32| (u64::from(n) * 100 / total).min(100);
    let _ = writeln!(out, "<div class=\"chart\">");
    let _ = writeln!(
        out,
        "<div class=\"bar bar-score\" style=\"width:{}%\">Score {}</div>",
        result.score.min(100),
        result.score
    );
    for (class, label, count) in [
        ("passed", "Passed", result.summary.passed),
        ("failed", "Failed", result.summary.failed),
        ("warnings", "Warnings", result.summary.warnings),
    ] {
        let _ = writeln!(
            out,
            "<div class=\"bar bar-{}\" style=\"width:{}%\">{} {}</div>",
            class,
            pct(count),
            label,
            count
        );
    }
    let _ = writeln!(out, "</div>");
}

impl Exporter for HtmlExporter {
    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>> {
        let result = doc.result;
        let title = escape_html(doc.title());
        let mut out = String::new();

        let _ = writeln!(out, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>");
        let _ = writeln!(out, "<meta charset=\"utf-8\">");
        let _ = writeln!(out, "<title>{}</title>", title);
        let _ = writeln!(out, "<style>{}</style>", STYLE);
        let _ = writeln!(out, "</head>\n<body>\n<header>");
        if let Some(logo) = doc.config.logo().and_then(safe_logo) {
            let _ = writeln!(out, "<img class=\"logo\" src=\"{}\" alt=\"logo\">", escape_html(logo));
        }
        let _ = writeln!(out, "<h1>{}</h1>", title);
        if let Some(attribution) = doc.attribution() {
            let _ = writeln!(out, "<p class=\"meta\">{}</p>", escape_html(&attribution));
        }
        let _ = writeln!(out, "<p class=\"meta\">{}</p>", doc.generated_line());
        let _ = writeln!(out, "</header>");

        let _ = writeln!(out, "<section>\n<h2>Summary</h2>\n<table>");
        for (key, value) in doc.summary_rows() {
            let class = if key == "Overall" {
                format!(" class=\"overall-{}\"", result.overall.as_str())
            } else {
                String::new()
            };
            let _ = writeln!(out, "<tr><th>{}</th><td{}>{}</td></tr>", key, class, escape_html(&value));
        }
        let _ = writeln!(out, "</table>");
        if doc.config.include_charts() {
            chart(&mut out, result);
        }
        let _ = writeln!(out, "</section>");

        let _ = writeln!(out, "<section>\n<h2>Issues</h2>");
        if result.issues.is_empty() {
            let _ = writeln!(out, "<p>No issues found.</p>");
        } else {
            let _ = writeln!(
                out,
                "<table>\n<tr><th>Severity</th><th>Category</th><th>Message</th><th>Suggestion</th></tr>"
            );
            for issue in &result.issues {
                let _ = writeln!(
                    out,
                    "<tr><td class=\"sev-{0}\">{0}</td><td>{1}</td><td>{2}</td><td>{3}</td></tr>",
                    issue.severity.as_str(),
                    escape_html(&issue.category),
                    escape_html(&issue.message),
                    escape_html(&issue.suggestion)
                );
            }
            let _ = writeln!(out, "</table>");
        }
        let _ = writeln!(out, "</section>");

        if !result.recommendations.is_empty() {
            let _ = writeln!(out, "<section>\n<h2>Recommendations</h2>\n<ul>");
            for rec in &result.recommendations {
                let _ = writeln!(out, "<li>{}</li>", escape_html(rec));
            }
            let _ = writeln!(out, "</ul>\n</section>");
        }

        let _ = writeln!(
            out,
            "<section>\n<h2>Details</h2>\n<pre>{}</pre>\n</section>",
            escape_html(&doc.dump()?)
        );

        if let Some(generator) = doc.generator() {
            let _ = writeln!(out, "<footer>Generated by {}</footer>", generator);
        }
        let _ = writeln!(out, "</body>\n</html>");
        Ok(out.into_bytes())
    }
}
