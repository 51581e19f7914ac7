//! Minimal PDF 1.4 writer: monospaced text pages with a real xref table.

use std::fmt::Write as _;

use super::{Exporter, ReportDocument};

const LINES_PER_PAGE: usize = 60;
const WRAP_COLUMNS: usize = 85;
const FONT_SIZE: u32 = 10;
const LEADING: u32 = 12;
const TOP: u32 = 760;
const LEFT: u32 = 50;

pub struct PdfExporter;

impl Exporter for PdfExporter {
    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, doc: &ReportDocument<'_>) -> anyhow::Result<Vec<u8>> {
        let lines = report_lines(doc)?;
        let pages: Vec<&[String]> = lines.chunks(LINES_PER_PAGE).collect();
        let title = doc.title().to_string();
        let created = doc.generated_at.format("D:%Y%m%d%H%M%SZ").to_string();
        Ok(write_pdf(&pages, &title, &created))
    }
}

fn report_lines(doc: &ReportDocument<'_>) -> anyhow::Result<Vec<String>> {
    let mut lines = vec![doc.title().to_string()];
    if let Some(attribution) = doc.attribution() {
        lines.push(attribution);
    }
    lines.push(doc.generated_line());
    lines.push(String::new());

    for section in doc.sections()? {
        lines.push(section.heading.to_uppercase());
        lines.extend(section.lines);
        lines.push(String::new());
    }
    if let Some(generator) = doc.generator() {
        lines.push(format!("Generated by {}", generator));
    }

    Ok(lines.iter().flat_map(|l| wrap(l, WRAP_COLUMNS)).collect())
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= width {
        return vec![line.to_string()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

/// Escape a string for a PDF literal. Courier's standard encoding has no
/// glyphs outside printable ASCII, so everything else becomes `?`.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\t' => out.push_str("    "),
            _ => out.push('?'),
        }
    }
    out.push(')');
    out
}

fn page_stream(lines: &[String]) -> String {
    let mut stream = String::new();
    let _ = writeln!(stream, "BT");
    let _ = writeln!(stream, "/F1 {} Tf", FONT_SIZE);
    let _ = writeln!(stream, "{} TL", LEADING);
    let _ = writeln!(stream, "{} {} Td", LEFT, TOP);
    for line in lines {
        let _ = writeln!(stream, "{} Tj T*", pdf_string(line));
    }
    let _ = writeln!(stream, "ET");
    stream
}

fn write_pdf(pages: &[&[String]], title: &str, created: &str) -> Vec<u8> {
    // 1 catalog, 2 page tree, 3 font, 4 info, then (content, page) per page.
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 6 + 2 * i).collect();
    let kids = page_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>".to_string(),
        format!(
            "<< /Title {} /Producer (VerifyForge) /CreationDate ({}) >>",
            pdf_string(title),
            created
        ),
    ];
    for lines in pages {
        let stream = page_stream(lines);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ));
        let content_id = objects.len();
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            content_id
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
    }

    let xref_at = out.len();
    let _ = writeln!(out, "xref");
    let _ = writeln!(out, "0 {}", objects.len() + 1);
    out.push_str("0000000000 65535 f \n");
    for offset in offsets {
        let _ = write!(out, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R /Info 4 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    );
    out.into_bytes()
}
