//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.shelftest.toml` files.

use crate::cli::OutputFormat;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".shelftest.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Purchase-driver questions.
    #[serde(default)]
    pub questions: QuestionsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "shelftest_report.md".to_string()
}

/// Where the test rows are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of JSON / JSONL exports.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the hosted row store.
    #[serde(default)]
    pub url: Option<String>,

    /// API key for the hosted row store.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Table names.
    #[serde(default)]
    pub tables: TableNames,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            url: None,
            api_key: None,
            timeout_seconds: default_timeout(),
            tables: TableNames::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Names of the tables (or export file prefixes) holding each row set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNames {
    #[serde(default = "default_tests_table")]
    pub tests: String,
    #[serde(default = "default_sessions_table")]
    pub sessions: String,
    #[serde(default = "default_surveys_table")]
    pub surveys: String,
    #[serde(default = "default_comparisons_table")]
    pub comparisons: String,
    #[serde(default = "default_competitors_table")]
    pub competitors: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            tests: default_tests_table(),
            sessions: default_sessions_table(),
            surveys: default_surveys_table(),
            comparisons: default_comparisons_table(),
            competitors: default_competitors_table(),
        }
    }
}

fn default_tests_table() -> String {
    "tests".to_string()
}

fn default_sessions_table() -> String {
    "sessions".to_string()
}

fn default_surveys_table() -> String {
    "surveys".to_string()
}

fn default_comparisons_table() -> String {
    "comparisons".to_string()
}

fn default_competitors_table() -> String {
    "competitors".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Include "why not the variant" answers.
    #[serde(default = "default_true")]
    pub include_reasons: bool,

    /// Maximum reasons listed per competitor.
    #[serde(default = "default_max_reasons")]
    pub max_reasons: usize,

    /// Text lines per PDF page.
    #[serde(default = "default_page_lines")]
    pub page_lines: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            include_reasons: true,
            max_reasons: default_max_reasons(),
            page_lines: default_page_lines(),
        }
    }
}

fn default_title() -> String {
    "Shelf Test Report".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_reasons() -> usize {
    5
}

fn default_page_lines() -> usize {
    48
}

/// Which rating questions the report covers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionsConfig {
    /// Question ids to report. Empty means every known question.
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Extended questions on top of the built-in purchase drivers.
    #[serde(default)]
    pub extra: Vec<ExtraQuestion>,
}

/// An extended rating question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraQuestion {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Accepted response columns, in priority order. Defaults to the id.
    #[serde(default)]
    pub fields: Vec<String>,
}

/// The resolved data store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Files(PathBuf),
    Rest { url: String, api_key: Option<String> },
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // A store given on the command line replaces whatever the file configured
        if let Some(ref url) = args.store_url {
            self.store.url = Some(url.clone());
            self.store.data_dir = None;
        }
        if let Some(ref dir) = args.data_dir {
            self.store.data_dir = Some(dir.clone());
            self.store.url = None;
        }
        if let Some(ref key) = args.api_key {
            self.store.api_key = Some(key.clone());
        }
        if let Some(timeout) = args.timeout {
            self.store.timeout_seconds = timeout;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        if let Some(ref questions) = args.questions {
            self.questions.enabled = questions.clone();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Resolve the configured data store.
    pub fn store_backend(&self) -> Result<StoreBackend> {
        match (&self.store.data_dir, &self.store.url) {
            (Some(dir), _) => Ok(StoreBackend::Files(dir.clone())),
            (None, Some(url)) => Ok(StoreBackend::Rest {
                url: url.clone(),
                api_key: self.store.api_key.clone(),
            }),
            (None, None) => bail!(
                "No data store configured: pass --data-dir or --store-url, or set [store] in {}",
                CONFIG_FILE
            ),
        }
    }

    /// Output path for the report.
    ///
    /// When the configured path still carries the default Markdown extension
    /// but another format was chosen, the extension follows the format.
    pub fn output_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.general.output);
        if self.general.output == default_output() {
            path.with_extension(self.general.format.extension())
        } else {
            path
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "shelftest_report.md");
        assert_eq!(config.store.timeout_seconds, 30);
        assert_eq!(config.store.tables.sessions, "sessions");
        assert_eq!(config.report.page_lines, 48);
        assert!(config.questions.enabled.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "bars.pdf"
format = "pdf"
verbose = true

[store]
url = "https://rows.example.com"
timeout_seconds = 10

[store.tables]
sessions = "tester_sessions"

[questions]
enabled = ["value", "packaging"]

[[questions.extra]]
id = "packaging"
label = "Packaging"
fields = ["packaging", "package_design"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "bars.pdf");
        assert_eq!(config.general.format, OutputFormat::Pdf);
        assert!(config.general.verbose);
        assert_eq!(config.store.timeout_seconds, 10);
        assert_eq!(config.store.tables.sessions, "tester_sessions");
        assert_eq!(config.store.tables.surveys, "surveys");
        assert_eq!(config.questions.extra[0].fields.len(), 2);
        assert_eq!(
            config.store_backend().unwrap(),
            StoreBackend::Rest {
                url: "https://rows.example.com".to_string(),
                api_key: None
            }
        );
    }

    #[test]
    fn test_merge_with_args() {
        use clap::Parser;

        let mut config = Config::default();
        config.store.url = Some("https://rows.example.com".to_string());

        let args = crate::cli::Args::try_parse_from([
            "shelftest",
            "--test",
            "42",
            "--data-dir",
            "exports",
            "--format",
            "json",
            "--questions",
            "value",
            "--timeout",
            "5",
        ])
        .unwrap();
        config.merge_with_args(&args);

        assert_eq!(
            config.store_backend().unwrap(),
            StoreBackend::Files(PathBuf::from("exports"))
        );
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.store.timeout_seconds, 5);
        assert_eq!(config.questions.enabled, vec!["value".to_string()]);
    }

    #[test]
    fn test_store_backend_required() {
        assert!(Config::default().store_backend().is_err());
    }

    #[test]
    fn test_output_path_follows_format() {
        let mut config = Config::default();
        config.general.format = OutputFormat::Json;
        assert_eq!(config.output_path(), PathBuf::from("shelftest_report.json"));

        config.general.output = "custom.txt".to_string();
        assert_eq!(config.output_path(), PathBuf::from("custom.txt"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[report]"));
    }
}
