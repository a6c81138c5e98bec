//! Row source backed by a directory of table exports.
//!
//! Every `.json` (array of rows, or a single row object) or `.jsonl` (one
//! row per line) file below the data directory whose name starts with a
//! table name is treated as a shard of that table, e.g. `sessions.json`,
//! `sessions-2024-05.jsonl`.

use super::{row_matches, RowSource, StoreError, Table};
use crate::config::TableNames;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Export directory row source.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    tables: TableNames,
}

impl FileStore {
    /// Create a store over an export directory.
    pub fn new(root: PathBuf, tables: TableNames) -> Self {
        Self { root, tables }
    }

    /// Files holding rows of `table`, in path order.
    pub fn shards(&self, table: Table) -> Vec<PathBuf> {
        let name = table.name(&self.tables);

        let mut shards: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !is_hidden(e.file_name().to_str().unwrap_or(""))
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_shard_of(p, name))
            .collect();

        shards.sort();
        shards
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// `sessions.json`, `sessions-01.jsonl` and `sessions_old.json` are shards of `sessions`.
fn is_shard_of(path: &Path, table: &str) -> bool {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if extension != "json" && extension != "jsonl" {
        return false;
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    match stem.strip_prefix(table) {
        Some(rest) => rest.is_empty() || rest.starts_with('-') || rest.starts_with('_'),
        None => false,
    }
}

/// Read all rows of one shard.
fn read_shard(path: &Path) -> Result<Vec<Value>, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |source: serde_json::Error| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    };

    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        return content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).map_err(parse_error))
            .collect();
    }

    match serde_json::from_str::<Value>(&content).map_err(parse_error)? {
        Value::Array(rows) => Ok(rows),
        row @ Value::Object(_) => Ok(vec![row]),
        _ => Err(StoreError::NotRows {
            table: path.display().to_string(),
        }),
    }
}

impl RowSource for FileStore {
    fn describe(&self) -> String {
        format!("files:{}", self.root.display())
    }

    async fn fetch(&self, table: Table, test_id: &str) -> Result<Vec<Value>, StoreError> {
        let shards = self.shards(table);
        if shards.is_empty() {
            return Err(StoreError::MissingTable {
                table: table.name(&self.tables).to_string(),
                dir: self.root.clone(),
            });
        }

        let column = table.filter_column();
        let mut rows = Vec::new();

        for shard in &shards {
            let shard_rows = read_shard(shard)?;
            debug!("{}: {} rows", shard.display(), shard_rows.len());
            rows.extend(
                shard_rows
                    .into_iter()
                    .filter(|row| row_matches(row, column, test_id)),
            );
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn store(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().to_path_buf(), TableNames::default())
    }

    #[test]
    fn test_is_shard_of() {
        assert!(is_shard_of(Path::new("sessions.json"), "sessions"));
        assert!(is_shard_of(Path::new("sessions-2024.jsonl"), "sessions"));
        assert!(is_shard_of(Path::new("sessions_old.json"), "sessions"));
        assert!(!is_shard_of(Path::new("sessionsx.json"), "sessions"));
        assert!(!is_shard_of(Path::new("sessions.csv"), "sessions"));
        assert!(!is_shard_of(Path::new("surveys.json"), "sessions"));
    }

    #[test]
    fn test_fetch_merges_shards_and_filters() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "sessions.json",
            r#"[{"id": "s1", "test_id": "t1"}, {"id": "s2", "test_id": "t2"}]"#,
        );
        write(
            dir.path(),
            "archive/sessions-2024.jsonl",
            "{\"id\": \"s3\", \"test_id\": \"t1\"}\n\n{\"id\": \"s4\", \"test_id\": \"t1\"}\n",
        );

        let rows = tokio_test::block_on(store(&dir).fetch(Table::Sessions, "t1")).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["s3", "s4", "s1"]);
    }

    #[test]
    fn test_single_object_export() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tests.json", r#"{"id": "t1", "name": "Bars"}"#);

        let rows = tokio_test::block_on(store(&dir).fetch(Table::Tests, "t1")).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_missing_table() {
        let dir = TempDir::new().unwrap();
        let result = tokio_test::block_on(store(&dir).fetch(Table::Surveys, "t1"));
        assert!(matches!(result, Err(StoreError::MissingTable { .. })));
    }

    #[test]
    fn test_malformed_shard() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "surveys.json", "[{\"id\": ");
        let result = tokio_test::block_on(store(&dir).fetch(Table::Surveys, "t1"));
        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_hidden_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            ".cache/competitors.json",
            r#"[{"id": "x", "test_id": "t1"}]"#,
        );
        assert!(store(&dir).shards(Table::Competitors).is_empty());
    }

    #[test]
    fn test_custom_table_names() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tester_sessions.json", r#"[{"id": "s1", "test_id": "t1"}]"#);
        let tables = TableNames {
            sessions: "tester_sessions".to_string(),
            ..TableNames::default()
        };
        let store = FileStore::new(dir.path().to_path_buf(), tables);
        assert_eq!(store.shards(Table::Sessions).len(), 1);
    }
}
