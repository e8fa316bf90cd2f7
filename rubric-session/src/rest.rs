//! Realtime-database style REST store.
//!
//! Every path maps to `{database_url}/{path}.json`:
//!
//! | Operation | HTTP |
//! |-----------|------|
//! | read | `GET` (a `null` body means absent) |
//! | write | `PUT` with the JSON value |
//! | delete | `DELETE` |
//!
//! When an auth token is configured it is sent as the `auth` query parameter.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use rubric_common::config::RemoteStoreConfig;
use serde_json::Value;
use std::time::Duration;

use crate::store::{segments, RemoteStore, StoreError, StoreResult};

/// REST-backed [`RemoteStore`].
pub struct RestStore {
    client: Client,
    base_url: String,
    auth: Option<String>,
}

impl RestStore {
    /// Build a store from configuration. No request is made until first use.
    pub fn new(config: &RemoteStoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.database_url.trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, segments(path).join("/"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        let response = self.send(self.client.get(self.url(path))).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn write(&self, path: &str, value: &Value) -> StoreResult<()> {
        self.send(self.client.put(self.url(path)).json(value)).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.send(self.client.delete(self.url(path))).await?;
        Ok(())
    }
}
