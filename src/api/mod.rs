//! Upstream gene and variant APIs.
//!
//! The [fetch orchestrators](crate::client) only depend on the [`GeneApi`] and
//! [`VariantApi`] traits. [`HttpGeneApi`] and [`EnsemblVariantApi`] are the
//! network implementations.

#[cfg(test)]
pub(crate) mod fake;
pub mod format;
pub mod gene;
pub mod scoring;
pub mod variant;

#[doc(inline)]
pub use gene::*;
#[doc(inline)]
pub use scoring::*;
#[doc(inline)]
pub use variant::*;

use crate::ApiError;

#[cfg(feature = "download")]
use color_eyre::eyre::{Report, Result, WrapErr};
#[cfg(feature = "download")]
use log::debug;
use serde_json::Value;

/// Source of gene indices, details and scores.
#[allow(async_fn_in_trait)]
pub trait GeneApi {
    /// Ordered list of gene symbols.
    async fn symbols_index(&self) -> Result<Vec<String>, ApiError>;
    /// Ordered list of HGNC identifiers, aligned with [`symbols_index`](GeneApi::symbols_index).
    async fn hgnc_index(&self) -> Result<Vec<String>, ApiError>;
    /// Details of one gene, including its gene-level score.
    async fn gene_details(&self, symbol: &str) -> Result<Value, ApiError>;
    /// Scores of all genes.
    async fn gene_scores(&self) -> Result<Value, ApiError>;
}

/// A gene API that may not be configured. Every call fails with
/// [`ApiError::InvalidInput`] when it is `None`.
impl<G: GeneApi> GeneApi for Option<G> {
    async fn symbols_index(&self) -> Result<Vec<String>, ApiError> {
        configured(self)?.symbols_index().await
    }

    async fn hgnc_index(&self) -> Result<Vec<String>, ApiError> {
        configured(self)?.hgnc_index().await
    }

    async fn gene_details(&self, symbol: &str) -> Result<Value, ApiError> {
        configured(self)?.gene_details(symbol).await
    }

    async fn gene_scores(&self) -> Result<Value, ApiError> {
        configured(self)?.gene_scores().await
    }
}

fn configured<G>(api: &Option<G>) -> Result<&G, ApiError> {
    api.as_ref().ok_or_else(|| {
        ApiError::InvalidInput("The gene API is not configured, set --gene-api-url or --gene-api-config.".to_string())
    })
}

/// Variant annotation service.
#[allow(async_fn_in_trait)]
pub trait VariantApi {
    async fn analyze(&self, request: &VariantRequest) -> Result<VariantOutput, ApiError>;
}

// ----------------------------------------------------------------------------
// HTTP
// ----------------------------------------------------------------------------

/// A client that asks for JSON and identifies this crate.
#[cfg(feature = "download")]
pub fn http_client() -> Result<reqwest::Client, Report> {
    use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))));

    reqwest::Client::builder().default_headers(headers).build().wrap_err("Failed to build the HTTP client.")
}

/// Map a non-success response to [`ApiError::Status`], keeping the body for diagnostics.
#[cfg(feature = "download")]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), url, body })
}

#[cfg(feature = "download")]
async fn decode(response: reqwest::Response) -> Result<Value, ApiError> {
    let url = response.url().to_string();
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode { url, message: e.to_string() })
}

/// GET a JSON document.
#[cfg(feature = "download")]
pub async fn get_json(client: &reqwest::Client, url: &str) -> Result<Value, ApiError> {
    debug!("GET {url}");
    let response = client.get(url).send().await?;
    decode(check_status(response).await?).await
}

/// POST a JSON body and return the JSON response.
#[cfg(feature = "download")]
pub async fn post_json(client: &reqwest::Client, url: &str, body: &Value) -> Result<Value, ApiError> {
    debug!("POST {url}");
    let response = client.post(url).json(body).send().await?;
    decode(check_status(response).await?).await
}
