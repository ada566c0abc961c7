//! Narrow interface to the remote relational store.
//!
//! The lifecycle manager never sees this layer; it only ever talks to the
//! local store and the outbox. Backend conventions (REST shape, header
//! names) stay behind `RemoteStore`.

use async_trait::async_trait;
use serde_json::Value;

use crate::{CoreError, Result};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert(&self, table: &str, row: &Value) -> Result<()>;
    async fn update(&self, table: &str, id: &str, row: &Value) -> Result<()>;
    async fn select(&self, table: &str, filters: &[(&str, String)]) -> Result<Vec<Value>>;
}

/// PostgREST-style HTTP implementation.
pub struct HttpRemoteStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

fn network_err(err: reqwest::Error) -> CoreError {
    CoreError::Network(err.to_string())
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn insert(&self, table: &str, row: &Value) -> Result<()> {
        self.authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(network_err)?
            .error_for_status()
            .map_err(network_err)?;
        Ok(())
    }

    async fn update(&self, table: &str, id: &str, row: &Value) -> Result<()> {
        self.authed(self.client.patch(self.table_url(table)))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(network_err)?
            .error_for_status()
            .map_err(network_err)?;
        Ok(())
    }

    async fn select(&self, table: &str, filters: &[(&str, String)]) -> Result<Vec<Value>> {
        let query: Vec<(String, String)> = std::iter::once(("select".to_string(), "*".to_string()))
            .chain(
                filters
                    .iter()
                    .map(|(column, value)| (column.to_string(), format!("eq.{value}"))),
            )
            .collect();

        let rows = self
            .authed(self.client.get(self.table_url(table)))
            .query(&query)
            .send()
            .await
            .map_err(network_err)?
            .error_for_status()
            .map_err(network_err)?
            .json::<Vec<Value>>()
            .await
            .map_err(network_err)?;

        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    /// In-memory remote with failure injection, shared by the sync and
    /// lifecycle tests.
    #[derive(Default)]
    pub(crate) struct MemoryRemote {
        pub rows: Mutex<HashMap<String, Vec<Value>>>,
        pub failing: AtomicBool,
    }

    impl MemoryRemote {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub async fn row_count(&self, table: &str) -> usize {
            self.rows
                .lock()
                .await
                .get(table)
                .map(Vec::len)
                .unwrap_or(0)
        }

        fn check_available(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(CoreError::Network("remote unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RemoteStore for MemoryRemote {
        async fn insert(&self, table: &str, row: &Value) -> Result<()> {
            self.check_available()?;
            self.rows
                .lock()
                .await
                .entry(table.to_string())
                .or_default()
                .push(row.clone());
            Ok(())
        }

        async fn update(&self, table: &str, id: &str, row: &Value) -> Result<()> {
            self.check_available()?;
            let mut rows = self.rows.lock().await;
            let table_rows = rows.entry(table.to_string()).or_default();
            match table_rows
                .iter_mut()
                .find(|existing| existing.get("id").and_then(Value::as_str) == Some(id))
            {
                Some(existing) => {
                    *existing = row.clone();
                    Ok(())
                }
                None => Err(CoreError::Network(format!(
                    "no remote row {id} in {table}"
                ))),
            }
        }

        async fn select(&self, table: &str, filters: &[(&str, String)]) -> Result<Vec<Value>> {
            self.check_available()?;
            let rows = self.rows.lock().await;
            let table_rows = rows.get(table).cloned().unwrap_or_default();
            Ok(table_rows
                .into_iter()
                .filter(|row| {
                    filters.iter().all(|(column, value)| {
                        row.get(*column).and_then(Value::as_str) == Some(value.as_str())
                    })
                })
                .collect())
        }
    }
}
