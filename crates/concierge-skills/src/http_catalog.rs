//! Primary catalog source backed by an HTTP endpoint.

use concierge_core::{CatalogError, CatalogSource, OperationDefinition};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogPayload {
    Listed(Vec<OperationDefinition>),
    Wrapped { operations: Vec<OperationDefinition> },
}

/// Parses either a bare JSON array of entries or `{"operations": [...]}`.
pub fn parse_catalog_payload(body: &str) -> Result<Vec<OperationDefinition>, CatalogError> {
    match serde_json::from_str::<CatalogPayload>(body)? {
        CatalogPayload::Listed(defs) | CatalogPayload::Wrapped { operations: defs } => Ok(defs),
    }
}

/// GETs the catalog from `url` on every fetch.
pub struct HttpCatalogSource {
    url: String,
    client: reqwest::Client,
}

impl HttpCatalogSource {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            client,
        }
    }

    fn unavailable(&self, reason: impl ToString) -> CatalogError {
        CatalogError::Source {
            source_name: self.describe(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl CatalogSource for HttpCatalogSource {
    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }

    async fn fetch(&self) -> Result<Vec<OperationDefinition>, CatalogError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {}", status)));
        }
        let body = response.text().await.map_err(|e| self.unavailable(e))?;
        parse_catalog_payload(&body)
    }
}
