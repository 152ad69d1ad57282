//! REST client for the EIP's data API.
//!
//! The data API follows PostgREST conventions: tables live under
//! `/rest/v1/{table}`, filters are query-string operators (`col=eq.value`),
//! ordering is `order=col.desc`, and stored functions are called with
//! `POST /rest/v1/rpc/{function}`. Every request carries the service-role key
//! in both the `apikey` and `Authorization` headers.

use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// `Prefer` header asking the API to echo affected rows back.
const RETURN_REPRESENTATION: &str = "return=representation";

/// `Prefer` header turning a primary-key conflict into a no-op.
const IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=minimal";

/// Filter, ordering and paging parameters for a table request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict returned columns (`select=a,b,c`).
    pub fn select(self, columns: &str) -> Self {
        self.push("select", columns.to_string())
    }

    /// `column = value`.
    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("eq.{value}"))
    }

    /// `column < value`.
    pub fn lt(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("lt.{value}"))
    }

    /// Order by `column` descending.
    pub fn order_desc(self, column: &str) -> Self {
        self.push("order", format!("{column}.desc"))
    }

    /// Order by `column` ascending.
    pub fn order_asc(self, column: &str) -> Self {
        self.push("order", format!("{column}.asc"))
    }

    pub fn limit(self, n: usize) -> Self {
        self.push("limit", n.to_string())
    }

    pub fn offset(self, n: usize) -> Self {
        self.push("offset", n.to_string())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.pairs.push((key.to_string(), value));
        self
    }
}

/// Render a timestamp the way filter values expect it (RFC 3339, `Z` suffix).
pub fn filter_timestamp(ts: scout_core::types::Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// HTTP client for the EIP REST data API.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestClient {
    /// Create a client.
    ///
    /// * `base_url` - EIP project URL, e.g. `https://xyz.eip.example`.
    /// * `service_key` - service-role key with row-level access to every table.
    pub fn new(base_url: &str, service_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, service_key)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /rest/v1/{table}?{query}`.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> StoreResult<Vec<T>> {
        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(query.pairs())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET` returning at most one row.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> StoreResult<Option<T>> {
        let rows: Vec<T> = self.select(table, &query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// `POST /rest/v1/{table}` returning the inserted rows.
    pub async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> StoreResult<Vec<T>> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `POST /rest/v1/{table}?on_conflict={column}` where a row that already
    /// exists is left untouched instead of failing with 409.
    pub async fn insert_ignoring_duplicates<B: Serialize + ?Sized>(
        &self,
        table: &str,
        conflict_column: &str,
        body: &B,
    ) -> StoreResult<()> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", IGNORE_DUPLICATES)
            .query(&[("on_conflict", conflict_column)])
            .json(body)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Insert a single row and return it.
    pub async fn insert_one<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> StoreResult<T> {
        let rows: Vec<T> = self.insert(table, body).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {table} returned no rows")))
    }

    /// `PATCH /rest/v1/{table}?{query}` returning the updated rows.
    pub async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        body: &B,
    ) -> StoreResult<Vec<T>> {
        let response = self
            .authorized(self.client.patch(self.table_url(table)))
            .header("Prefer", RETURN_REPRESENTATION)
            .query(query.pairs())
            .json(body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `DELETE /rest/v1/{table}?{query}`. Returns the number of deleted rows.
    pub async fn delete(&self, table: &str, query: &Query) -> StoreResult<u64> {
        let response = self
            .authorized(self.client.delete(self.table_url(table)))
            .header("Prefer", RETURN_REPRESENTATION)
            .query(query.pairs())
            .send()
            .await?;

        let rows: Vec<serde_json::Value> = Self::parse_response(response).await?;
        Ok(rows.len() as u64)
    }

    /// Call a stored function: `POST /rest/v1/rpc/{function}`.
    pub async fn rpc<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        function: &str,
        args: &B,
    ) -> StoreResult<T> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/rest/v1/rpc/{function}", self.base_url)),
            )
            .json(args)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Ensure the response has a success status code, otherwise return
    /// [`StoreError::Api`] with the status and body text.
    pub(crate) async fn ensure_success(
        response: reqwest::Response,
    ) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn query_renders_operators_in_order() {
        let q = Query::new()
            .select("id,email")
            .eq("user_id", "abc")
            .order_desc("created_at")
            .limit(1);

        let expected: Vec<(String, String)> = vec![
            ("select".into(), "id,email".into()),
            ("user_id".into(), "eq.abc".into()),
            ("order".into(), "created_at.desc".into()),
            ("limit".into(), "1".into()),
        ];
        assert_eq!(q.pairs(), expected.as_slice());
    }

    #[test]
    fn lt_filter_uses_rfc3339_utc() {
        let ts = chrono::Utc
            .with_ymd_and_hms(2025, 6, 1, 0, 0, 0)
            .single()
            .expect("valid date");
        let q = Query::new().lt("expires_at", filter_timestamp(ts));
        assert_eq!(q.pairs()[0].1, "lt.2025-06-01T00:00:00Z");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = RestClient::new("https://eip.example/", "key");
        assert_eq!(client.base_url(), "https://eip.example");
    }
}
