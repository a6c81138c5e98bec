//! Shelftest - storefront A/B test reports
//!
//! A CLI tool that reads the shopper sessions, survey answers and competitor
//! comparisons recorded for one simulated e-commerce test and turns them into
//! share-of-buy and purchase-driver reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, unreachable store, unknown test, etc.)
//!   2 - Some report sections had no data and --fail-on-no-data was set

mod analysis;
mod cli;
mod config;
mod context;
mod models;
mod report;
mod store;

use analysis::QuestionSet;
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, StoreBackend, CONFIG_FILE};
use context::ReportContext;
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, ReportInputs, ReportMetadata, Section};
use report::ReportOptions;
use std::time::{Duration, Instant};
use store::{FileStore, RestStore, RowSource};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the file can turn on verbose output
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("Shelftest v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Build the report
    match run_report(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .shelftest.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the data store, table names and rating questions.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete report workflow. Returns exit code (0 or 2).
async fn run_report(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let questions = QuestionSet::from_config(&config.questions)?;
    let ctx = ReportContext::new(args.test_id().trim(), questions);
    let backend = config.store_backend()?;

    // Step 1: Load the rows of the test
    println!("📥 Loading test {}", ctx.test_id);
    let spinner = make_spinner(args.quiet, "Fetching sessions, surveys and comparisons...");

    let (inputs, source) = match backend {
        StoreBackend::Files(dir) => {
            info!("Using data directory: {}", dir.display());
            let store = FileStore::new(dir, config.store.tables.clone());
            fetch(&store, &ctx.test_id).await
        }
        StoreBackend::Rest { url, api_key } => {
            info!("Using hosted store: {}", url);
            let store = RestStore::new(
                &url,
                api_key,
                config.store.timeout_seconds,
                config.store.tables.clone(),
            )?;
            fetch(&store, &ctx.test_id).await
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let inputs = inputs?;

    // Handle --dry-run: show what was loaded and exit
    if args.dry_run {
        return handle_dry_run(&inputs, &source);
    }

    if !inputs.sessions.is_ready() {
        warn!("Sessions could not be loaded; purchase sections will have no data");
    }

    // Step 2: Aggregate
    println!("🧮 Aggregating {} rating questions...", ctx.questions.len());
    let summary = analysis::aggregate(&ctx, &inputs);

    // Step 3: Build the report
    let metadata = ReportMetadata {
        test_id: ctx.test_id.clone(),
        generated_at: ctx.generated_at,
        source,
        sessions_loaded: section_len(&inputs.sessions),
        rows_skipped: inputs.skipped_rows,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };
    let report = Report { metadata, summary };

    // Step 4: Generate and save the report
    println!("📝 Generating report...");
    let options = ReportOptions::from(&config.report);
    let output_path = config.output_path();

    match config.general.format {
        OutputFormat::Pdf => report::write_pdf_report(&report, &options, &output_path)?,
        OutputFormat::Json => write_report(&output_path, &report::generate_json_report(&report)?)?,
        OutputFormat::Markdown => write_report(
            &output_path,
            &report::generate_markdown_report(&report, &options),
        )?,
    }

    // Print summary
    println!("\n📊 Test Summary:");
    for variant in report.summary.variants.values() {
        match &variant.purchase {
            Section::Ready(stats) => println!(
                "   Variant {}: {}% share of buy, {}% share of clicks ({} sessions)",
                variant.label, stats.share_of_buy, stats.share_of_clicks, stats.sessions
            ),
            Section::NoData { .. } => println!("   Variant {}: no purchase data", variant.label),
        }
    }
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!(
        "\n✅ Report complete! Saved to: {}",
        output_path.display()
    );

    // Check --fail-on-no-data
    let missing = report.summary.missing_sections();
    if !missing.is_empty() {
        for reason in &missing {
            warn!("Section without data: {}", reason);
        }
        if args.fail_on_no_data {
            eprintln!(
                "\n⛔ {} report sections had no data. Failing (exit code 2).",
                missing.len()
            );
            return Ok(2);
        }
    }

    Ok(0)
}

async fn fetch<S: RowSource>(store: &S, test_id: &str) -> (Result<ReportInputs>, String) {
    let inputs = store::load_inputs(store, test_id)
        .await
        .with_context(|| format!("Failed to load test {} from {}", test_id, store.describe()));
    (inputs, store.describe())
}

fn make_spinner(quiet: bool, message: &str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("   {spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}

fn section_len<T>(section: &Section<Vec<T>>) -> usize {
    section.ready().map(Vec::len).unwrap_or(0)
}

fn write_report(path: &std::path::Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Handle --dry-run: print row counts per table, exit.
fn handle_dry_run(inputs: &ReportInputs, source: &str) -> Result<i32> {
    println!("\n🔍 Dry run: rows loaded from {} (no report written)\n", source);

    let test = &inputs.test;
    println!(
        "   Test: {} ({} variants)",
        if test.name.is_empty() { &test.id } else { &test.name },
        test.labels().len()
    );

    print_count("sessions", &inputs.sessions);
    print_count("surveys", &inputs.surveys);
    print_count("comparisons", &inputs.comparisons);
    print_count("competitors", &inputs.competitors);

    if inputs.skipped_rows > 0 {
        println!("     ⚠️  {} rows could not be decoded", inputs.skipped_rows);
    }

    println!("\n✅ Dry run complete.");
    Ok(0)
}

fn print_count<T>(table: &str, section: &Section<Vec<T>>) {
    match section {
        Section::Ready(rows) => println!("     📄 {}: {} rows", table, rows.len()),
        Section::NoData { reason } => println!("     ❌ {}: {}", table, reason),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
