//! Row source backed by a hosted PostgREST-style API.
//!
//! Rows are read with `GET {url}/rest/v1/{table}?{column}=eq.{test_id}&select=*`.

use super::{RowSource, StoreError, Table};
use crate::config::TableNames;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Hosted row store.
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    api_key: Option<String>,
    tables: TableNames,
    http_client: Client,
}

impl RestStore {
    /// Create a client for the store at `base_url`.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_seconds: u64,
        tables: TableNames,
    ) -> Result<Self, StoreError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|source| StoreError::Http {
                table: String::new(),
                source,
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            tables,
            http_client,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name(&self.tables))
    }
}

impl RowSource for RestStore {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch(&self, table: Table, test_id: &str) -> Result<Vec<Value>, StoreError> {
        let name = table.name(&self.tables).to_string();
        let url = self.table_url(table);
        debug!("GET {} ({}=eq.{})", url, table.filter_column(), test_id);

        let mut request = self.http_client.get(&url).query(&[
            (table.filter_column(), format!("eq.{}", test_id)),
            ("select", "*".to_string()),
        ]);
        if let Some(ref key) = self.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|source| StoreError::Http {
            table: name.clone(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                table: name,
                status,
                body,
            });
        }

        let body: Value = response.json().await.map_err(|source| StoreError::Http {
            table: name.clone(),
            source,
        })?;

        match body {
            Value::Array(rows) => Ok(rows),
            _ => Err(StoreError::NotRows { table: name }),
        }
    }
}
