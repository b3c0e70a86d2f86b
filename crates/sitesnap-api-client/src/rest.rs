//! Table access through the backend's REST interface.
//!
//! Filters follow the `column=op.value` query convention; writes ask for the stored
//! representation back so callers receive server-assigned columns.

use std::fmt::Display;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{ApiClient, ApiError, ApiResult};

/// Filter, ordering and projection for a table request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn in_list<V: Display>(mut self, column: &str, values: &[V]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.params
            .push((column.to_string(), format!("in.({})", joined)));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.params.push(("limit".to_string(), limit.to_string()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

fn table_path(table: &str) -> String {
    format!("/rest/v1/{}", table)
}

impl ApiClient {
    /// Select rows matching `query`.
    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> ApiResult<Vec<T>> {
        let request = self
            .request(Method::GET, &table_path(table))
            .query(query.params());
        self.send_json(request).await
    }

    /// Insert one row and return it as stored.
    pub async fn insert<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        row: &B,
    ) -> ApiResult<T> {
        let request = self
            .request(Method::POST, &table_path(table))
            .header("Prefer", "return=representation")
            .json(row);
        let rows: Vec<T> = self.send_json(request).await?;
        single_row(rows, table)
    }

    /// Insert or merge one row keyed on `on_conflict`, returning it as stored.
    pub async fn upsert<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        row: &B,
        on_conflict: &str,
    ) -> ApiResult<T> {
        let request = self
            .request(Method::POST, &table_path(table))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(row);
        let rows: Vec<T> = self.send_json(request).await?;
        single_row(rows, table)
    }

    /// Patch every row matching `query`; returns the updated rows.
    ///
    /// Row-level security can make an update match nothing, so an empty result is
    /// not an error here.
    pub async fn update<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        query: &Query,
        patch: &B,
    ) -> ApiResult<Vec<T>> {
        let request = self
            .request(Method::PATCH, &table_path(table))
            .query(query.params())
            .header("Prefer", "return=representation")
            .json(patch);
        self.send_json(request).await
    }

    /// Delete every row matching `query`.
    pub async fn delete_rows(&self, table: &str, query: &Query) -> ApiResult<()> {
        let request = self
            .request(Method::DELETE, &table_path(table))
            .query(query.params());
        self.send(request).await?;
        Ok(())
    }
}

fn single_row<T>(rows: Vec<T>, table: &str) -> ApiResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| ApiError::Decode(format!("{} write returned no rows", table)))
}
