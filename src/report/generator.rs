//! Markdown and JSON report generation.
//!
//! The Markdown report is the on-screen view of a test: an overview across
//! variants followed by one section per variant. Sections whose rows could
//! not be loaded render an explicit placeholder instead of empty tables.

use super::{format_average, insufficient_data, ReportOptions};
use crate::analysis::combined_competitors;
use crate::models::{
    CompetitorShare, QuestionAverage, Report, ReportMetadata, Section, TestSummary,
    VariantSummary,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportOptions) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!("# {}\n\n", options.title));

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata, &report.summary));

    // Table of contents
    output.push_str(&generate_table_of_contents(&report.summary));

    // Cross-variant overview
    output.push_str(&generate_overview_section(&report.summary));

    // One section per variant
    for variant in report.summary.variants.values() {
        output.push_str(&generate_variant_section(variant, options));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, summary: &TestSummary) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    if summary.test_name.is_empty() {
        section.push_str(&format!("- **Test:** `{}`\n", summary.test_id));
    } else {
        section.push_str(&format!(
            "- **Test:** {} (`{}`)\n",
            summary.test_name, summary.test_id
        ));
    }
    if !summary.search_term.is_empty() {
        section.push_str(&format!("- **Search Term:** {}\n", summary.search_term));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Data Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Sessions Loaded:** {}\n",
        metadata.sessions_loaded
    ));
    if metadata.rows_skipped > 0 {
        section.push_str(&format!("- **Rows Skipped:** {}\n", metadata.rows_skipped));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(summary: &TestSummary) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Overview](#overview)\n");

    for label in summary.variants.keys() {
        toc.push_str(&format!(
            "- [Variant {}](#variant-{})\n",
            label,
            label.as_str()
        ));
    }

    toc.push('\n');

    toc
}

/// Generate the overview across all variants.
fn generate_overview_section(summary: &TestSummary) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");

    if summary.variants.is_empty() {
        section.push_str(&format!(
            "_{}_\n\n",
            insufficient_data("the test defines no variants and no sessions were recorded")
        ));
        return section;
    }

    section.push_str("| Variant | Product | Share of Buy | Share of Clicks | Value Score |\n");
    section.push_str("|:---|:---|:---:|:---:|:---:|\n");
    for variant in summary.variants.values() {
        let (buy, clicks) = match &variant.purchase {
            Section::Ready(stats) => (
                format!("{}%", stats.share_of_buy),
                format!("{}%", stats.share_of_clicks),
            ),
            Section::NoData { .. } => ("n/a".to_string(), "n/a".to_string()),
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            variant.label,
            escape_cell(&variant.product_title),
            buy,
            clicks,
            format_average(variant.value_score)
        ));
    }
    section.push('\n');

    let competitors = combined_competitors(summary);
    if !competitors.is_empty() {
        section.push_str("### Competitor Share of Buy\n\n");
        section.push_str("| Variant | Competitor | Selections | Share of Buy |\n");
        section.push_str("|:---|:---|:---:|:---:|\n");
        for row in competitors {
            section.push_str(&format!(
                "| {} | {} | {} | {}% |\n",
                row.variant,
                escape_cell(&row.title),
                row.selections,
                row.share_of_buy
            ));
        }
        section.push('\n');
    }

    let missing = summary.missing_sections();
    if !missing.is_empty() {
        section.push_str("### Data Gaps\n\n");
        for reason in missing {
            section.push_str(&format!("- {}\n", reason));
        }
        section.push('\n');
    }

    section
}

/// Generate the section for one variant.
fn generate_variant_section(variant: &VariantSummary, options: &ReportOptions) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Variant {}\n\n", variant.label));
    if !variant.product_id.is_empty() {
        section.push_str(&format!(
            "*Product: {} (`{}`)*\n\n",
            variant.product_title, variant.product_id
        ));
    }

    section.push_str("### Purchase Breakdown\n\n");
    match &variant.purchase {
        Section::Ready(stats) => {
            section.push_str(
                "| Sessions | Test Product | Competitors | Total | Share of Buy | Share of Clicks |\n",
            );
            section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
            section.push_str(&format!(
                "| {} | {} | {} | {} | {}% | {}% |\n\n",
                stats.sessions,
                stats.test_product_selections,
                stats.competitor_selections,
                stats.total,
                stats.share_of_buy,
                stats.share_of_clicks
            ));

            if stats.survey_fallback {
                section.push_str(
                    "> No checkout was recorded for the test product; one selection was inferred from a survey response.\n\n",
                );
            }

            section.push_str(&generate_competitor_table(&stats.competitors));
            section.push_str(&generate_competitor_ratings(&stats.competitors, options));
        }
        Section::NoData { reason } => {
            section.push_str(&format!("_{}_\n\n", insufficient_data(reason)));
        }
    }

    section.push_str("### Purchase Drivers\n\n");
    section.push_str(&generate_ratings_table(&variant.ratings));

    if options.include_reasons {
        section.push_str(&generate_answer_list(
            "What shoppers liked most",
            &variant.likes_most,
            options.max_reasons,
        ));
        section.push_str(&generate_answer_list(
            "Suggested improvements",
            &variant.improvements,
            options.max_reasons,
        ));
    }

    section
}

/// Generate the competitor share-of-buy table of a variant.
fn generate_competitor_table(competitors: &[CompetitorShare]) -> String {
    if competitors.is_empty() {
        return String::new();
    }

    let mut table = String::new();

    table.push_str("### Competitors\n\n");
    table.push_str("| Competitor | Selections | Share of Buy |\n");
    table.push_str("|:---|:---:|:---:|\n");
    for competitor in competitors {
        table.push_str(&format!(
            "| {} | {} | {}% |\n",
            escape_cell(&competitor.title),
            competitor.selections,
            competitor.share_of_buy
        ));
    }
    table.push('\n');

    table
}

/// Generate rating tables and reasons for competitors that were bought.
fn generate_competitor_ratings(competitors: &[CompetitorShare], options: &ReportOptions) -> String {
    let mut section = String::new();

    for competitor in competitors.iter().filter(|c| c.selections > 0) {
        section.push_str(&format!("#### {}\n\n", competitor.title));
        section.push_str(&generate_ratings_table(&competitor.ratings));

        if options.include_reasons {
            section.push_str(&generate_answer_list(
                "Why shoppers did not choose the variant",
                &competitor.reasons,
                options.max_reasons,
            ));
        }
    }

    section
}

/// Generate a bulleted list of free-text answers, capped at `max` entries.
fn generate_answer_list(heading: &str, answers: &[String], max: usize) -> String {
    if answers.is_empty() {
        return String::new();
    }

    let mut list = String::new();

    list.push_str(&format!("**{}:**\n\n", heading));
    for answer in answers.iter().take(max) {
        list.push_str(&format!("- {}\n", single_line(answer)));
    }
    if answers.len() > max {
        list.push_str(&format!("- _...and {} more_\n", answers.len() - max));
    }
    list.push('\n');

    list
}

/// Make text safe to place in a Markdown table cell.
fn escape_cell(text: &str) -> String {
    single_line(text).replace('|', "\\|")
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Generate a question / average table.
fn generate_ratings_table(ratings: &Section<Vec<QuestionAverage>>) -> String {
    let mut table = String::new();

    match ratings {
        Section::Ready(averages) if averages.iter().all(|a| a.responses == 0) => {
            table.push_str(&format!("_{}_\n\n", insufficient_data("no responses recorded")));
        }
        Section::Ready(averages) => {
            table.push_str("| Question | Average | Responses |\n");
            table.push_str("|:---|:---:|:---:|\n");
            for average in averages {
                table.push_str(&format!(
                    "| {} | {} | {} |\n",
                    escape_cell(&average.label),
                    format_average(average.average),
                    average.responses
                ));
            }
            table.push('\n');
        }
        Section::NoData { reason } => {
            table.push_str(&format!("_{}_\n\n", insufficient_data(reason)));
        }
    }

    table
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by shelftest*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
