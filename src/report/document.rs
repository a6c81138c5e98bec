//! Page layout for the PDF export.
//!
//! The report is flattened into fixed-width text lines grouped into pages:
//! an overview page first, then one section per variant that always starts
//! on a fresh page. Long sections continue on further pages.

use super::{format_average, insufficient_data, ReportOptions};
use crate::analysis::combined_competitors;
use crate::models::{QuestionAverage, Report, Section, VariantSummary};

/// One printed page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub heading: String,
    pub lines: Vec<String>,
}

/// A report laid out into pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

/// Lay a report out into pages of at most `options.page_lines` lines.
pub fn build_document(report: &Report, options: &ReportOptions) -> Document {
    let mut pages = paginate("Overview", overview_lines(report), options.page_lines);

    for variant in report.summary.variants.values() {
        let heading = format!("Variant {}", variant.label);
        pages.extend(paginate(
            &heading,
            variant_lines(variant, options),
            options.page_lines,
        ));
    }

    Document {
        title: options.title.clone(),
        pages,
    }
}

/// Split a section into pages. An empty section still gets one page.
pub fn paginate(heading: &str, lines: Vec<String>, page_lines: usize) -> Vec<Page> {
    if lines.is_empty() {
        return vec![Page {
            heading: heading.to_string(),
            lines,
        }];
    }

    lines
        .chunks(page_lines.max(1))
        .enumerate()
        .map(|(index, chunk)| Page {
            heading: if index == 0 {
                heading.to_string()
            } else {
                format!("{} (continued)", heading)
            },
            lines: chunk.to_vec(),
        })
        .collect()
}

fn overview_lines(report: &Report) -> Vec<String> {
    let summary = &report.summary;
    let metadata = &report.metadata;
    let mut lines = Vec::new();

    if summary.test_name.is_empty() {
        lines.push(format!("Test: {}", summary.test_id));
    } else {
        lines.push(format!("Test: {} ({})", summary.test_name, summary.test_id));
    }
    if !summary.search_term.is_empty() {
        lines.push(format!("Search term: {}", summary.search_term));
    }
    lines.push(format!(
        "Generated: {}",
        metadata.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    lines.push(format!("Sessions loaded: {}", metadata.sessions_loaded));
    lines.push(String::new());

    if summary.variants.is_empty() {
        lines.push(insufficient_data("no variants"));
        return lines;
    }

    lines.push(format!(
        "{:<8}{:<28}{:>8}{:>10}{:>8}",
        "Variant", "Product", "Buy %", "Clicks %", "Value"
    ));
    for variant in summary.variants.values() {
        let (buy, clicks) = match &variant.purchase {
            Section::Ready(stats) => (stats.share_of_buy.clone(), stats.share_of_clicks.clone()),
            Section::NoData { .. } => ("n/a".to_string(), "n/a".to_string()),
        };
        lines.push(format!(
            "{:<8}{:<28}{:>8}{:>10}{:>8}",
            variant.label.to_string(),
            truncate(&variant.product_title, 27),
            buy,
            clicks,
            format_average(variant.value_score)
        ));
    }

    let competitors = combined_competitors(summary);
    if !competitors.is_empty() {
        lines.push(String::new());
        lines.push("Competitor share of buy".to_string());
        lines.push(format!(
            "{:<8}{:<36}{:>8}{:>10}",
            "Variant", "Competitor", "Picks", "Buy %"
        ));
        for row in competitors {
            lines.push(format!(
                "{:<8}{:<36}{:>8}{:>10}",
                row.variant.to_string(),
                truncate(&row.title, 35),
                row.selections,
                row.share_of_buy
            ));
        }
    }

    let missing = summary.missing_sections();
    if !missing.is_empty() {
        lines.push(String::new());
        lines.push("Data gaps".to_string());
        lines.extend(missing.into_iter().map(|reason| format!("- {}", reason)));
    }

    lines
}

fn variant_lines(variant: &VariantSummary, options: &ReportOptions) -> Vec<String> {
    let mut lines = Vec::new();

    if !variant.product_id.is_empty() {
        lines.push(format!(
            "Product: {} ({})",
            variant.product_title, variant.product_id
        ));
        lines.push(String::new());
    }

    match &variant.purchase {
        Section::Ready(stats) => {
            lines.push(format!("Sessions: {}", stats.sessions));
            lines.push(format!(
                "Selections: {} test product, {} competitors, {} total",
                stats.test_product_selections, stats.competitor_selections, stats.total
            ));
            lines.push(format!("Share of buy: {}%", stats.share_of_buy));
            lines.push(format!("Share of clicks: {}%", stats.share_of_clicks));
            if stats.survey_fallback {
                lines.push("Note: test product selection inferred from a survey response.".to_string());
            }

            if !stats.competitors.is_empty() {
                lines.push(String::new());
                lines.push(format!("{:<44}{:>8}{:>10}", "Competitor", "Picks", "Buy %"));
                for competitor in &stats.competitors {
                    lines.push(format!(
                        "{:<44}{:>8}{:>10}",
                        truncate(&competitor.title, 43),
                        competitor.selections,
                        competitor.share_of_buy
                    ));
                }
            }

            for competitor in stats.competitors.iter().filter(|c| c.selections > 0) {
                lines.push(String::new());
                lines.push(format!("vs. {}", competitor.title));
                lines.extend(rating_lines(&competitor.ratings));
                if options.include_reasons {
                    lines.extend(quoted(&competitor.reasons, options.max_reasons));
                }
            }
        }
        Section::NoData { reason } => lines.push(insufficient_data(reason)),
    }

    lines.push(String::new());
    lines.push("Purchase drivers".to_string());
    lines.extend(rating_lines(&variant.ratings));

    if options.include_reasons {
        for (heading, answers) in [
            ("Liked most", &variant.likes_most),
            ("Suggested improvements", &variant.improvements),
        ] {
            if !answers.is_empty() {
                lines.push(String::new());
                lines.push(heading.to_string());
                lines.extend(quoted(answers, options.max_reasons));
            }
        }
    }

    lines
}

fn quoted(answers: &[String], max: usize) -> impl Iterator<Item = String> + '_ {
    answers
        .iter()
        .take(max)
        .map(|answer| format!("  \"{}\"", truncate(&single_line(answer), 70)))
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn rating_lines(ratings: &Section<Vec<QuestionAverage>>) -> Vec<String> {
    match ratings {
        Section::Ready(averages) => averages
            .iter()
            .map(|a| {
                format!(
                    "  {:<28}{:>6}{:>8}",
                    a.label,
                    format_average(a.average),
                    format!("({})", a.responses)
                )
            })
            .collect(),
        Section::NoData { reason } => vec![format!("  {}", insufficient_data(reason))],
    }
}

/// Shorten to `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
