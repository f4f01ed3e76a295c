use crate::model::AssetRecord;
use futures::{future::BoxFuture, FutureExt};
use log::{info, warn};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("catalog endpoint returned status {0}")]
    Status(StatusCode),
    #[error("catalog payload is not a JSON array of records: {0}")]
    InvalidPayload(String),
    #[error("catalog contained no records")]
    Empty,
}

impl CatalogError {
    /// Everything except `Empty` counts as a network failure for retry purposes.
    pub fn is_network(&self) -> bool {
        !matches!(self, CatalogError::Empty)
    }
}

/// Anything that can produce the raw catalog. The HTTP endpoint in
/// production, fixtures in tests.
pub trait CatalogSource: Send + Sync {
    fn fetch_catalog(&self) -> BoxFuture<'_, Result<Vec<AssetRecord>, CatalogError>>;
}

#[derive(Clone, Debug)]
pub struct HttpCatalog {
    client: Client,
    endpoint: String,
    empty_is_error: bool,
}

impl HttpCatalog {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            empty_is_error: false,
        }
    }

    pub fn empty_is_error(mut self, enabled: bool) -> Self {
        self.empty_is_error = enabled;
        self
    }

    async fn fetch(&self) -> Result<Vec<AssetRecord>, CatalogError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(header::CACHE_CONTROL, "no-cache, no-store")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status));
        }

        let body = response.bytes().await?;
        let records = parse_catalog(&body)?;
        info!(
            "Fetched {} catalog records from {}",
            records.len(),
            self.endpoint
        );

        if records.is_empty() && self.empty_is_error {
            return Err(CatalogError::Empty);
        }
        Ok(records)
    }
}

impl CatalogSource for HttpCatalog {
    fn fetch_catalog(&self) -> BoxFuture<'_, Result<Vec<AssetRecord>, CatalogError>> {
        self.fetch().boxed()
    }
}

/// Parses a catalog body, dropping blank rows.
pub fn parse_catalog(body: &[u8]) -> Result<Vec<AssetRecord>, CatalogError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| CatalogError::InvalidPayload(err.to_string()))?;
    let Value::Array(rows) = value else {
        return Err(CatalogError::InvalidPayload(
            "top-level value is not an array".to_string(),
        ));
    };

    let total = rows.len();
    let records: Vec<AssetRecord> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| match row {
            Value::Object(fields) => AssetRecord::from_raw(fields),
            _ => {
                warn!("Skipping catalog row {index}: not an object");
                None
            }
        })
        .collect();

    if records.len() < total {
        info!("Dropped {} blank catalog rows", total - records.len());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_blank_rows_and_keeps_order() {
        let body = br#"[
            {"title": "One", "image": "a.png"},
            {"title": " ", "image": "", "link": null},
            {"title": "", "author": "solo"},
            {"title": "Two"}
        ]"#;
        let records = parse_catalog(body).unwrap();
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "", "Two"]);
        assert_eq!(records[1].author, "solo");
    }

    #[test]
    fn non_object_rows_are_skipped() {
        let records = parse_catalog(br#"[1, "x", {"title": "ok"}]"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn rejects_invalid_payloads() {
        assert!(matches!(
            parse_catalog(b"<html>oops</html>"),
            Err(CatalogError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_catalog(br#"{"title": "x"}"#),
            Err(CatalogError::InvalidPayload(_))
        ));
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_catalog(b"[]").unwrap().is_empty());
    }
}
