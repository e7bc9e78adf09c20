// SPDX-License-Identifier: MIT

//! HTTP transport for the catalog endpoints
//!
//! Responses use a `{success, data}` envelope. 401/403 become auth errors,
//! every other failure is a transport error.

use crate::conditions::{
    ConditionsError, Item, ItemId, ItemProvider, SourceCatalog, SourceProvider,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;

/// Response envelope shared by the catalog endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Body of an items request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemsRequest {
    pub source: String,
    #[serde(default)]
    pub search: String,
    /// Restrict the response to these identifiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<ItemId>>,
}

/// Catalog provider backed by the host's HTTP endpoints
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Create an HttpCatalog from the environment
    ///
    /// Requires `VC_CATALOG_URL`; `VC_API_TOKEN` is optional.
    pub fn from_env() -> Result<Self, ConditionsError> {
        let base_url = env::var("VC_CATALOG_URL")
            .map_err(|_| ConditionsError::config("VC_CATALOG_URL must be set"))?;
        let token = env::var("VC_API_TOKEN").ok().filter(|t| !t.is_empty());
        Ok(Self::new(base_url, token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ConditionsError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ConditionsError::transport(format!("{}: {}", url, e)))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = resp.text().await.unwrap_or_default();
            return Err(ConditionsError::auth(format!("{} ({})", text, status)));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ConditionsError::transport(format!(
                "Catalog error {}: {}",
                status, text
            )));
        }

        let envelope: Envelope<T> = resp.json().await?;
        if !envelope.success {
            return Err(ConditionsError::transport(
                envelope
                    .message
                    .unwrap_or_else(|| format!("{} reported failure", path)),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ConditionsError::transport(format!("{} returned no data", path)))
    }
}

#[async_trait]
impl SourceProvider for HttpCatalog {
    async fn list_sources(&self) -> Result<SourceCatalog, ConditionsError> {
        log::debug!("Requesting sources from {}", self.base_url);
        self.post("sources", &serde_json::json!({})).await
    }
}

#[async_trait]
impl ItemProvider for HttpCatalog {
    async fn list_items(&self, source: &str, query: &str) -> Result<Vec<Item>, ConditionsError> {
        log::debug!("Requesting items of '{}' matching '{}'", source, query);
        let body = ItemsRequest {
            source: source.to_string(),
            search: query.to_string(),
            include: None,
        };
        self.post("items", &body).await
    }

    async fn resolve_items(
        &self,
        source: &str,
        ids: &[ItemId],
    ) -> Result<Vec<Item>, ConditionsError> {
        let body = ItemsRequest {
            source: source.to_string(),
            search: String::new(),
            include: Some(ids.to_vec()),
        };
        self.post("items", &body).await
    }
}
