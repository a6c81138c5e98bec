//! PDF export.
//!
//! Pages from [`build_document`] are written with the built-in Courier
//! fonts, so every column lines up and no font files need embedding.

use super::document::{build_document, Document as ReportDocument, Page};
use super::ReportOptions;
use crate::models::Report;
use anyhow::{anyhow, Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::debug;

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: i64 = 50;

const TITLE_Y: i64 = 800;
const HEADING_Y: i64 = 776;
const BODY_TOP_Y: i64 = 752;
const FOOTER_Y: i64 = 30;

const TITLE_SIZE: i64 = 16;
const HEADING_SIZE: i64 = 14;
const BODY_SIZE: i64 = 10;
const FOOTER_SIZE: i64 = 8;
const LEADING: i64 = 14;

/// Render a laid-out report into PDF bytes.
pub fn render_pdf(document: &ReportDocument) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let page_count = document.pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(page_count);

    for (index, page) in document.pages.iter().enumerate() {
        let footer = format!("{} - page {} of {}", document.title, index + 1, page_count);
        let content = page_content(&document.title, page, &footer, index == 0);
        let encoded = content
            .encode()
            .map_err(|e| anyhow!("Failed to encode page {}: {}", index + 1, e))?;

        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_count as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id: ObjectId = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| anyhow!("Failed to serialize PDF: {}", e))?;

    debug!("Rendered {} PDF pages ({} bytes)", page_count, bytes.len());
    Ok(bytes)
}

/// Render a report and write it to `path`.
pub fn write_pdf_report(report: &Report, options: &ReportOptions, path: &Path) -> Result<()> {
    let document = build_document(report, options);
    let bytes = render_pdf(&document)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

fn page_content(title: &str, page: &Page, footer: &str, first: bool) -> Content {
    let mut operations = Vec::new();

    if first {
        text(&mut operations, "F2", TITLE_SIZE, TITLE_Y, title);
    }
    text(&mut operations, "F2", HEADING_SIZE, HEADING_Y, &page.heading);

    let mut y = BODY_TOP_Y;
    for line in &page.lines {
        if !line.is_empty() {
            text(&mut operations, "F1", BODY_SIZE, y, line);
        }
        y -= LEADING;
    }

    text(&mut operations, "F1", FOOTER_SIZE, FOOTER_Y, footer);

    Content { operations }
}

fn text(operations: &mut Vec<Operation>, font: &str, size: i64, y: i64, value: &str) {
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new(
        "Tf",
        vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)],
    ));
    operations.push(Operation::new(
        "Td",
        vec![Object::Integer(MARGIN_LEFT), Object::Integer(y)],
    ));
    operations.push(Operation::new(
        "Tj",
        vec![Object::string_literal(to_ascii(value))],
    ));
    operations.push(Operation::new("ET", vec![]));
}

/// The standard fonts only cover Latin-1 reliably; anything outside printable ASCII becomes `?`.
fn to_ascii(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn document(pages: usize) -> ReportDocument {
        ReportDocument {
            title: "Shelf Test Report".to_string(),
            pages: (0..pages)
                .map(|i| Page {
                    heading: format!("Page {}", i),
                    lines: vec!["Share of buy: 40.0%".to_string(), String::new()],
                })
                .collect(),
        }
    }

    #[test]
    fn test_render_pdf_pages() {
        let bytes = render_pdf(&document(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let parsed = Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 3);
    }

    #[test]
    fn test_to_ascii() {
        assert_eq!(to_ascii("Café (50%)"), "Caf? (50%)");
        assert_eq!(to_ascii("tab\there"), "tab?here");
    }

    #[test]
    fn test_write_pdf_report() {
        use crate::models::{ReportMetadata, TestSummary};
        use chrono::Utc;
        use std::collections::BTreeMap;

        let report = Report {
            metadata: ReportMetadata {
                test_id: "t1".to_string(),
                generated_at: Utc::now(),
                source: "memory".to_string(),
                sessions_loaded: 0,
                rows_skipped: 0,
                duration_seconds: 0.0,
            },
            summary: TestSummary {
                test_id: "t1".to_string(),
                test_name: String::new(),
                search_term: String::new(),
                variants: BTreeMap::new(),
            },
        };

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.pdf");
        write_pdf_report(&report, &ReportOptions::default(), &path).unwrap();

        let parsed = Document::load(&path).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }
}
