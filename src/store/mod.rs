//! Read-only access to the rows of a test.
//!
//! A [`RowSource`] returns raw JSON rows for a table filtered by test id.
//! [`load_inputs`] fetches every table a report needs, decodes the rows and
//! turns each row set that could not be read into a "no data" section so one
//! broken table never takes the whole report down.

pub mod files;
pub mod rest;

pub use files::FileStore;
pub use rest::RestStore;

use crate::config::TableNames;
use crate::models::{
    ComparisonResponse, CompetitorProduct, ReportInputs, Section, SessionRow, ShopperSession,
    SurveyResponse, TestDefinition,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The row sets a report reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Tests,
    Sessions,
    Surveys,
    Comparisons,
    Competitors,
}

impl Table {
    /// Column a row set is filtered on.
    pub fn filter_column(&self) -> &'static str {
        match self {
            Table::Tests => "id",
            _ => "test_id",
        }
    }

    /// Configured name of the table.
    pub fn name<'a>(&self, names: &'a TableNames) -> &'a str {
        match self {
            Table::Tests => &names.tests,
            Table::Sessions => &names.sessions,
            Table::Surveys => &names.surveys,
            Table::Comparisons => &names.comparisons,
            Table::Competitors => &names.competitors,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Tests => write!(f, "tests"),
            Table::Sessions => write!(f, "sessions"),
            Table::Surveys => write!(f, "surveys"),
            Table::Comparisons => write!(f, "comparisons"),
            Table::Competitors => write!(f, "competitors"),
        }
    }
}

/// Errors reading rows from a data store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no export found for table '{table}' in {}", dir.display())]
    MissingTable { table: String, dir: PathBuf },

    #[error("request for table '{table}' failed: {source}")]
    Http {
        table: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("store returned {status} for table '{table}': {body}")]
    Status {
        table: String,
        status: u16,
        body: String,
    },

    #[error("table '{table}' did not return a list of rows")]
    NotRows { table: String },

    #[error("failed to decode {table} row: {source}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("test '{test_id}' not found")]
    TestNotFound { test_id: String },
}

/// A read-only source of test rows.
#[allow(async_fn_in_trait)]
pub trait RowSource {
    /// Human-readable description used in report metadata.
    fn describe(&self) -> String;

    /// All rows of `table` that belong to `test_id`.
    async fn fetch(&self, table: Table, test_id: &str) -> Result<Vec<Value>, StoreError>;
}

/// Whether a row's filter column matches the test id. Numeric ids compare by their text.
pub(crate) fn row_matches(row: &Value, column: &str, test_id: &str) -> bool {
    match row.get(column) {
        Some(Value::String(s)) => s == test_id,
        Some(Value::Number(n)) => n.to_string() == test_id,
        _ => false,
    }
}

/// Decode rows one by one; rows that do not fit the expected shape are skipped.
fn decode_rows<T: DeserializeOwned>(
    table: Table,
    rows: Vec<Value>,
    skipped: &mut usize,
) -> Vec<T> {
    let mut decoded = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<T>(row) {
            Ok(value) => decoded.push(value),
            Err(e) => {
                warn!("Skipping malformed {} row #{}: {}", table, index, e);
                *skipped += 1;
            }
        }
    }

    decoded
}

/// The test definition row. Unlike other tables a malformed row is an error, not a skip.
fn decode_test(rows: Vec<Value>, test_id: &str) -> Result<TestDefinition, StoreError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::TestNotFound {
            test_id: test_id.to_string(),
        })?;

    serde_json::from_value(row).map_err(|source| StoreError::Decode {
        table: Table::Tests.to_string(),
        source,
    })
}

fn section<T: DeserializeOwned>(
    table: Table,
    result: Result<Vec<Value>, StoreError>,
    skipped: &mut usize,
) -> Section<Vec<T>> {
    match result {
        Ok(rows) => {
            debug!("Fetched {} {} rows", rows.len(), table);
            Section::Ready(decode_rows(table, rows, skipped))
        }
        Err(e) => {
            warn!("No {} data: {}", table, e);
            Section::no_data(format!("{} unavailable: {}", table, e))
        }
    }
}

/// Load everything a report on `test_id` needs.
///
/// The test definition is required; every other table degrades to
/// [`Section::NoData`] on failure.
pub async fn load_inputs<S: RowSource>(
    source: &S,
    test_id: &str,
) -> Result<ReportInputs, StoreError> {
    info!("Loading rows for test {} from {}", test_id, source.describe());

    let (tests, sessions, surveys, comparisons, competitors) = futures::join!(
        source.fetch(Table::Tests, test_id),
        source.fetch(Table::Sessions, test_id),
        source.fetch(Table::Surveys, test_id),
        source.fetch(Table::Comparisons, test_id),
        source.fetch(Table::Competitors, test_id),
    );

    let test = decode_test(tests?, test_id)?;

    let mut skipped = 0;

    let sessions = section::<SessionRow>(Table::Sessions, sessions, &mut skipped)
        .map(|rows| rows.into_iter().map(ShopperSession::from).collect());
    let surveys = section::<SurveyResponse>(Table::Surveys, surveys, &mut skipped);
    let comparisons = section::<ComparisonResponse>(Table::Comparisons, comparisons, &mut skipped);
    let competitors = section::<CompetitorProduct>(Table::Competitors, competitors, &mut skipped);

    if skipped > 0 {
        warn!("Skipped {} rows that could not be decoded", skipped);
    }

    Ok(ReportInputs {
        test,
        sessions,
        surveys,
        comparisons,
        competitors,
        skipped_rows: skipped,
    })
}
