//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shelftest - storefront A/B test reports
///
/// Aggregate shopper sessions, survey answers and competitor comparisons
/// of one test into share-of-buy and purchase-driver reports.
///
/// Examples:
///   shelftest --test 42 --data-dir ./exports
///   shelftest --test 42 --store-url https://rows.example.com --format pdf
///   shelftest --test 42 --data-dir ./exports --questions value,appearance
///   shelftest --test 42 --data-dir ./exports --dry-run
///   shelftest --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Id of the test to report on
    #[arg(short, long, value_name = "ID", required_unless_present = "init_config")]
    pub test: Option<String>,

    /// Directory holding JSON / JSONL exports of the test tables
    ///
    /// Takes precedence over --store-url
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the hosted row store
    #[arg(long, value_name = "URL", env = "SHELFTEST_STORE_URL")]
    pub store_url: Option<String>,

    /// API key for the hosted row store
    #[arg(long, value_name = "KEY", env = "SHELFTEST_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output file path for the report
    ///
    /// Defaults to shelftest_report.<format>
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, pdf)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .shelftest.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Questions to include (comma-separated ids)
    ///
    /// Example: --questions value,appearance,confidence
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub questions: Option<Vec<String>>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Request timeout in seconds for the hosted row store
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Load the rows and print row counts without writing a report
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 when any report section has no data
    #[arg(long)]
    pub fail_on_no_data: bool,

    /// Generate a default .shelftest.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// Paginated PDF export
    Pdf,
}

impl OutputFormat {
    /// File extension conventionally used for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Pdf => "pdf",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the test id (empty when not set; validate first).
    pub fn test_id(&self) -> &str {
        self.test.as_deref().unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.test_id().trim().is_empty() {
            return Err("Test id must not be empty".to_string());
        }

        // Validate store URL format
        if let Some(ref url) = self.store_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Store URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref questions) = self.questions {
            if questions.iter().any(|q| q.trim().is_empty()) {
                return Err("Question ids must not be empty".to_string());
            }
        }

        // Validate data directory if provided
        if let Some(ref dir) = self.data_dir {
            if !dir.exists() {
                return Err(format!("Data directory does not exist: {}", dir.display()));
            }
            if !dir.is_dir() {
                return Err(format!("Data path is not a directory: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
