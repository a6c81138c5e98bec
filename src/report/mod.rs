//! Report rendering.
//!
//! Markdown and JSON come from [`generator`]; the PDF export lays the same
//! numbers out with [`document`] and writes them with [`pdf`].

pub mod document;
pub mod generator;
pub mod pdf;

pub use generator::{generate_json_report, generate_markdown_report};
pub use pdf::write_pdf_report;

use crate::config::ReportConfig;

/// Rendering options shared by every format.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    pub include_reasons: bool,
    pub max_reasons: usize,
    pub page_lines: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            title: config.title.clone(),
            include_reasons: config.include_reasons,
            max_reasons: config.max_reasons,
            page_lines: config.page_lines.max(1),
        }
    }
}

/// Averages are kept exact and only rounded here.
pub fn format_average(average: Option<f64>) -> String {
    match average {
        Some(value) => format!("{:.1}", value),
        None => "n/a".to_string(),
    }
}

/// Placeholder text for a section that could not be computed.
pub fn insufficient_data(reason: &str) -> String {
    format!("Insufficient data: {}", reason)
}
