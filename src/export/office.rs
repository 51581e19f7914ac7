//! Word and Excel encoders, emitted as Office 2003 XML (WordprocessingML and
//! SpreadsheetML). Both open in current Office releases and LibreOffice.

use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{Exporter, ReportDocument};

const WORD_NS: &str = "http://schemas.microsoft.com/office/word/2003/wordml";
const SHEET_NS: &str = "urn:schemas-microsoft-com:office:spreadsheet";

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new(progid: &str) -> anyhow::Result<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.write_event(Event::PI(BytesPI::new(format!(
            "mso-application progid=\"{}\"",
            progid
        ))))?;
        Ok(Self { writer })
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> anyhow::Result<()> {
        let mut el = BytesStart::new(name);
        for attr in attrs {
            el.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(el))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> anyhow::Result<()> {
        let mut el = BytesStart::new(name);
        for attr in attrs {
            el.push_attribute(*attr);
        }
        self.writer.write_event(Event::Empty(el))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> anyhow::Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> anyhow::Result<()> {
        self.start(name, attrs)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

pub struct WordExporter;

impl WordExporter {
    fn paragraph(out: &mut XmlOut, text: &str, bold: bool, size: Option<&str>) -> anyhow::Result<()> {
        out.start("w:p", &[])?;
        out.start("w:r", &[])?;
        if bold || size.is_some() {
            out.start("w:rPr", &[])?;
            if bold {
                out.empty("w:b", &[])?;
            }
            if let Some(size) = size {
                out.empty("w:sz", &[("w:val", size)])?;
            }
            out.end("w:rPr")?;
        }
        out.text_element("w:t", &[("xml:space", "preserve")], text)?;
        out.end("w:r")?;
        out.end("w:p")
    }

    fn page_break(out: &mut XmlOut) -> anyhow::Result<()> {
        out.start("w:p", &[])?;
        out.start("w:r", &[])?;
        out.empty("w:br", &[("w:type", "page")])?;
        out.end("w:r")?;
        out.end("w:p")
    }
}

impl Exporter for WordExporter {
    fn content_type(&self) -> &'static str {
        "application/msword"
    }

    fn extension(&self) -> &'static str {
        "doc"
    }

    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>> {
        let mut out = XmlOut::new("Word.Document")?;
        out.start("w:wordDocument", &[("xmlns:w", WORD_NS)])?;
        out.start("w:body", &[])?;

        Self::paragraph(&mut out, doc.title(), true, Some("36"))?;
        if let Some(attribution) = doc.attribution() {
            Self::paragraph(&mut out, &attribution, false, None)?;
        }
        Self::paragraph(&mut out, &doc.generated_line(), false, Some("18"))?;

        for section in doc.sections()? {
            // Raw details start on their own page.
            if section.heading == "Details" {
                Self::page_break(&mut out)?;
            }
            Self::paragraph(&mut out, section.heading, true, Some("28"))?;
            for line in &section.lines {
                Self::paragraph(&mut out, line, false, None)?;
            }
        }

        if let Some(generator) = doc.generator() {
            Self::paragraph(&mut out, &format!("Generated by {}", generator), false, Some("16"))?;
        }

        out.end("w:body")?;
        out.end("w:wordDocument")?;
        Ok(out.finish())
    }
}

pub struct ExcelExporter;

enum Cell<'a> {
    Text(&'a str),
    Number(String),
}

impl ExcelExporter {
    fn worksheet(out: &mut XmlOut, name: &str, rows: &[Vec<Cell<'_>>]) -> anyhow::Result<()> {
        out.start("Worksheet", &[("ss:Name", name)])?;
        out.start("Table", &[])?;
        for row in rows {
            out.start("Row", &[])?;
            for cell in row {
                out.start("Cell", &[])?;
                match cell {
                    Cell::Text(text) => out.text_element("Data", &[("ss:Type", "String")], text)?,
                    Cell::Number(n) => out.text_element("Data", &[("ss:Type", "Number")], n)?,
                }
                out.end("Cell")?;
            }
            out.end("Row")?;
        }
        out.end("Table")?;
        out.end("Worksheet")
    }
}

impl Exporter for ExcelExporter {
    fn content_type(&self) -> &'static str {
        "application/vnd.ms-excel"
    }

    fn extension(&self) -> &'static str {
        "xls"
    }

    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>> {
        let result = doc.result;
        let generated = doc.generated_line();
        let attribution = doc.attribution();

        let mut summary = vec![vec![Cell::Text("Report"), Cell::Text(doc.title())]];
        if let Some(attribution) = attribution.as_deref() {
            summary.push(vec![Cell::Text("Prepared by"), Cell::Text(attribution)]);
        }
        summary.push(vec![Cell::Text("Generated"), Cell::Text(&generated)]);
        summary.push(vec![Cell::Text("Overall"), Cell::Text(result.overall.as_str())]);
        summary.push(vec![Cell::Text("Score"), Cell::Number(result.score.to_string())]);
        summary.push(vec![Cell::Text("Total checks"), Cell::Number(result.summary.total.to_string())]);
        summary.push(vec![Cell::Text("Passed"), Cell::Number(result.summary.passed.to_string())]);
        summary.push(vec![Cell::Text("Failed"), Cell::Number(result.summary.failed.to_string())]);
        summary.push(vec![Cell::Text("Warnings"), Cell::Number(result.summary.warnings.to_string())]);
        for recommendation in &result.recommendations {
            summary.push(vec![Cell::Text("Recommendation"), Cell::Text(recommendation)]);
        }

        let mut issues = vec![vec![
            Cell::Text("Severity"),
            Cell::Text("Category"),
            Cell::Text("Message"),
            Cell::Text("Suggestion"),
        ]];
        for issue in &result.issues {
            issues.push(vec![
                Cell::Text(issue.severity.as_str()),
                Cell::Text(&issue.category),
                Cell::Text(&issue.message),
                Cell::Text(&issue.suggestion),
            ]);
        }

        let flattened = doc.flattened()?;
        let mut details = vec![vec![Cell::Text("Field"), Cell::Text("Value")]];
        for (key, value) in &flattened {
            details.push(vec![Cell::Text(key), Cell::Text(value)]);
        }

        let mut out = XmlOut::new("Excel.Sheet")?;
        out.start("Workbook", &[("xmlns", SHEET_NS), ("xmlns:ss", SHEET_NS)])?;
        Self::worksheet(&mut out, "Summary", &summary)?;
        Self::worksheet(&mut out, "Issues", &issues)?;
        Self::worksheet(&mut out, "Details", &details)?;
        out.end("Workbook")?;
        Ok(out.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ReportConfig, ReportFormat};
    use crate::model::TestType;
    use crate::result::TestResult;
    use chrono::Utc;

    fn render(format: ReportFormat, result: &TestResult) -> String {
        let config = ReportConfig::default();
        let doc = ReportDocument {
            result,
            config: &config,
            generated_at: Utc::now(),
        };
        String::from_utf8(format.exporter().render(&doc).unwrap()).unwrap()
    }

    #[test]
    fn test_word_document_shape() {
        let xml = render(ReportFormat::Word, &TestResult::execution_error("a < b & c"));
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<?mso-application progid=\"Word.Document\"?>"));
        assert!(xml.contains("<w:br w:type=\"page\"/>"));
        assert!(xml.contains("a &lt; b &amp; c"));
        assert!(xml.contains("Generated by VerifyForge"));
    }

    #[test]
    fn test_excel_has_three_sheets() {
        let xml = render(ReportFormat::Excel, &TestResult::not_implemented(TestType::Api));
        for sheet in ["Summary", "Issues", "Details"] {
            assert!(xml.contains(&format!("<Worksheet ss:Name=\"{}\">", sheet)), "{sheet}");
        }
        assert!(xml.contains("<Data ss:Type=\"Number\">0</Data>"));
        assert!(xml.contains("<Data ss:Type=\"String\">engine</Data>"));
    }

    #[test]
    fn test_white_label_drops_generator() {
        let config = ReportConfig {
            white_label: Some(true),
            ..Default::default()
        };
        let result = TestResult::not_implemented(TestType::Web);
        let doc = ReportDocument {
            result: &result,
            config: &config,
            generated_at: Utc::now(),
        };
        let xml = String::from_utf8(WordExporter.render(&doc).unwrap()).unwrap();
        assert!(!xml.contains("Generated by VerifyForge"));
    }
}
