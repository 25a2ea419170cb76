//! Gene indices, details and scores served as static JSON files.

#[cfg(feature = "download")]
use crate::ApiError;

use color_eyre::eyre::{Report, Result, WrapErr};
use serde::{Deserialize, Serialize};
#[cfg(feature = "download")]
use serde_json::Value;
use std::path::Path;

/// Environment variable holding the base URL of the gene API.
pub const GENE_API_URL_ENV: &str = "NCSCORE_GENE_API_URL";

/// Locations of the gene JSON files.
///
/// ## Examples
///
/// ```rust
/// use ncscore::api::GeneApiConfig;
///
/// let config = GeneApiConfig::from_base_url("https://example.org/api/");
/// assert_eq!(config.symbols_index_url, "https://example.org/api/symbols.json");
/// assert_eq!(config.gene_details_url("NPHS1"), "https://example.org/api/genes/NPHS1.json");
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GeneApiConfig {
    /// Ordered list of gene symbols.
    pub symbols_index_url: String,
    /// Ordered list of HGNC identifiers, positionally aligned with the symbols.
    pub hgnc_index_url: String,
    /// Prefix of per-gene files, the symbol and `.json` are appended.
    pub gene_details_base_url: String,
    /// Scores of all genes.
    pub gene_scores_url: String,
}

impl GeneApiConfig {
    /// Conventional file layout below a base URL.
    pub fn from_base_url(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        GeneApiConfig {
            symbols_index_url: format!("{base_url}/symbols.json"),
            hgnc_index_url: format!("{base_url}/hgnc_ids.json"),
            gene_details_base_url: format!("{base_url}/genes/"),
            gene_scores_url: format!("{base_url}/gene_scores.json"),
        }
    }

    /// Read the gene API configuration from a JSON file.
    pub fn read(path: &Path) -> Result<GeneApiConfig, Report> {
        let config = std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read file: {path:?}."))?;
        let config = serde_json::from_str(&config).wrap_err_with(|| format!("Failed to parse file: {path:?}"))?;
        Ok(config)
    }

    pub fn gene_details_url(&self, symbol: &str) -> String {
        format!("{}{symbol}.json", self.gene_details_base_url)
    }
}

/// Gene data fetched with plain HTTP GET requests.
#[cfg(feature = "download")]
#[derive(Clone, Debug)]
pub struct HttpGeneApi {
    client: reqwest::Client,
    pub config: GeneApiConfig,
}

#[cfg(feature = "download")]
impl HttpGeneApi {
    pub fn new(config: GeneApiConfig) -> Result<Self, Report> {
        Ok(HttpGeneApi { client: super::http_client()?, config })
    }

    async fn index(&self, url: &str) -> Result<Vec<String>, ApiError> {
        // identifiers may be numbers or strings
        match super::get_json(&self.client, url).await? {
            Value::Array(values) => Ok(values
                .into_iter()
                .map(|value| match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect()),
            other => Err(ApiError::Decode { url: url.to_string(), message: format!("Expected a list, found: {other}") }),
        }
    }
}

#[cfg(feature = "download")]
impl super::GeneApi for HttpGeneApi {
    async fn symbols_index(&self) -> Result<Vec<String>, ApiError> {
        self.index(&self.config.symbols_index_url).await
    }

    async fn hgnc_index(&self) -> Result<Vec<String>, ApiError> {
        self.index(&self.config.hgnc_index_url).await
    }

    async fn gene_details(&self, symbol: &str) -> Result<Value, ApiError> {
        super::get_json(&self.client, &self.config.gene_details_url(symbol)).await
    }

    async fn gene_scores(&self) -> Result<Value, ApiError> {
        super::get_json(&self.client, &self.config.gene_scores_url).await
    }
}
