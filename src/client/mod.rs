//! Cached, retried fetching of gene and variant data, and scoring of the results.

#[cfg(test)]
mod tests;

use crate::annotation::{gene_score, prioritize_gene_symbol, variant_score};
use crate::api::{GeneApi, OutputFormat, VariantApi, VariantInput, VariantOptions, VariantOutput, VariantRequest};
use crate::batch::{BatchEntry, BatchResult};
use crate::cache::{cache_key, MemoryStore, ResponseCache, SessionStore, Sourced, DEFAULT_TTL};
use crate::retry::{retry_with_backoff, Classify, RetryOptions, RetryState, RetryStates};
use crate::variant::{normalize_variant, validate_variant};
use crate::ApiError;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use log::{debug, info, warn};
use ncscore_scoring::{InheritanceConfig, Priority, ScoreComponents};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Expiry of the symbol and HGNC indices.
pub const INDEX_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Expiry of the gene score summary.
pub const GENE_SCORES_TTL: Duration = Duration::from_secs(12 * 60 * 60);
/// Expiry of gene details.
pub const GENE_DETAILS_TTL: Duration = DEFAULT_TTL;
/// Expiry of variant annotations.
pub const VARIANT_TTL: Duration = DEFAULT_TTL;

// ----------------------------------------------------------------------------
// Gene Index
// ----------------------------------------------------------------------------

/// Gene symbols and their HGNC identifiers, positionally aligned.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GeneIndex {
    pub symbols: Vec<String>,
    pub hgnc_ids: Vec<String>,
}

impl GeneIndex {
    /// Combine the two indices, which must have the same length.
    ///
    /// ```rust
    /// use ncscore::client::GeneIndex;
    ///
    /// let symbols = vec!["NPHS1".to_string(), "NPHS2".to_string()];
    /// let hgnc_ids = vec!["7908".to_string(), "13394".to_string()];
    /// let index = GeneIndex::new(symbols.clone(), hgnc_ids)?;
    /// assert_eq!(index.hgnc_id("nphs2"), Some("13394"));
    /// assert!(GeneIndex::new(symbols, vec![]).is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn new(symbols: Vec<String>, hgnc_ids: Vec<String>) -> Result<Self, Report> {
        if symbols.len() != hgnc_ids.len() {
            return Err(eyre!(
                "Gene symbols ({}) and HGNC identifiers ({}) are not aligned.",
                symbols.len(),
                hgnc_ids.len()
            ));
        }
        Ok(GeneIndex { symbols, hgnc_ids })
    }

    /// Returns the HGNC identifier of a gene symbol, ignoring case.
    pub fn hgnc_id(&self, symbol: &str) -> Option<&str> {
        let i = self.symbols.iter().position(|s| s.eq_ignore_ascii_case(symbol))?;
        self.hgnc_ids.get(i).map(String::as_str)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.hgnc_id(symbol).is_some()
    }
}

// ----------------------------------------------------------------------------
// Assessment
// ----------------------------------------------------------------------------

/// Scores of one variant, with the gene they were attributed to.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Assessment {
    pub variant: String,
    pub gene_symbol: String,
    pub inheritance: String,
    pub segregation: Option<f64>,
    pub components: ScoreComponents,
    pub ncs: f64,
    pub priority: Priority,
}

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

/// Fetch orchestrator of gene and variant data.
///
/// Every fetch checks the [`ResponseCache`] first, calls the upstream API through
/// [`retry_with_backoff`] on a miss, and stores the result with a resource-specific TTL.
/// Errors of the upstream API are returned unchanged inside the [`Report`], so
/// callers can `downcast_ref::<ApiError>()`.
#[derive(Debug)]
pub struct NcsClient<G, V, S = MemoryStore> {
    pub gene_api: G,
    pub variant_api: V,
    pub cache: ResponseCache<S>,
    pub retry_options: RetryOptions<ApiError>,
    pub retry_states: RetryStates,
    pub inheritance: InheritanceConfig,
}

/// Returns the cached value for `key`, or fetches it with retries and stores it.
async fn fetch_cached<S, F, Fut>(
    cache: &mut ResponseCache<S>,
    key: &str,
    ttl: Duration,
    state: &mut RetryState,
    options: &RetryOptions<ApiError>,
    operation: F,
) -> Result<Sourced<Value>, Report>
where
    S: SessionStore,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, ApiError>>,
{
    if let Some(cached) = cache.get(key) {
        return Ok(cached);
    }
    let data = retry_with_backoff(operation, options, Some(state)).await?;
    Ok(cache.set(key, data, ttl))
}

impl<G: GeneApi, V: VariantApi, S: SessionStore> NcsClient<G, V, S> {
    pub fn new(gene_api: G, variant_api: V, cache: ResponseCache<S>) -> Self {
        NcsClient {
            gene_api,
            variant_api,
            cache,
            retry_options: RetryOptions::default(),
            retry_states: RetryStates::new(),
            inheritance: InheritanceConfig::default(),
        }
    }

    pub fn with_retry_options(mut self, options: RetryOptions<ApiError>) -> Self {
        self.retry_options = options;
        self
    }

    pub fn with_inheritance_config(mut self, config: InheritanceConfig) -> Self {
        self.inheritance = config;
        self
    }

    /// Retry options of gene symbol lookups: a 404 means the gene does not
    /// exist and is never retried, whatever the general policy says.
    fn gene_lookup_options(&self) -> RetryOptions<ApiError> {
        let general = self.retry_options.clone();
        let mut options = general.clone();
        options.should_retry =
            Some(Arc::new(move |error: &ApiError| error.response_status() != Some(404) && general.is_retryable(error)));
        options
    }

    // ------------------------------------------------------------------------
    // Genes

    async fn fetch_index(&mut self, kind: &str, symbols: bool) -> Result<Sourced<Vec<String>>, Report> {
        let api = &self.gene_api;
        let key = cache_key(kind, "all", &BTreeMap::new());
        let operation = move || async move {
            let index = match symbols {
                true => api.symbols_index().await?,
                false => api.hgnc_index().await?,
            };
            Ok::<Value, ApiError>(json!(index))
        };
        let sourced = fetch_cached(
            &mut self.cache,
            &key,
            INDEX_TTL,
            &mut self.retry_states.gene,
            &self.retry_options,
            operation,
        )
        .await?;
        sourced.try_map(|index| serde_json::from_value(index).wrap_err_with(|| format!("Failed to parse the {kind}.")))
    }

    /// Fetch the ordered list of gene symbols.
    pub async fn fetch_symbols_index(&mut self) -> Result<Sourced<Vec<String>>, Report> {
        self.retry_states.gene.reset();
        self.fetch_index("symbols-index", true).await
    }

    /// Fetch the ordered list of HGNC identifiers.
    pub async fn fetch_hgnc_index(&mut self) -> Result<Sourced<Vec<String>>, Report> {
        self.retry_states.gene.reset();
        self.fetch_index("hgnc-index", false).await
    }

    /// Fetch both indices as one operation and combine them.
    pub async fn fetch_gene_index(&mut self) -> Result<Sourced<GeneIndex>, Report> {
        self.retry_states.gene.reset();
        let symbols = self.fetch_index("symbols-index", true).await?;
        let hgnc_ids = self.fetch_index("hgnc-index", false).await?;
        let source = match symbols.source.from_cache && hgnc_ids.source.from_cache {
            true => symbols.source,
            false => hgnc_ids.source,
        };
        Ok(Sourced { data: GeneIndex::new(symbols.data, hgnc_ids.data)?, source })
    }

    /// Fetch the details of one gene.
    pub async fn fetch_gene_details(&mut self, symbol: &str) -> Result<Sourced<Value>, Report> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ApiError::InvalidInput("Gene symbol is required.".to_string()).into());
        }
        self.retry_states.gene.reset();

        let options = self.gene_lookup_options();
        let api = &self.gene_api;
        let key = cache_key("gene-details", symbol, &BTreeMap::new());
        debug!("Fetching gene details: {symbol}");
        fetch_cached(
            &mut self.cache,
            &key,
            GENE_DETAILS_TTL,
            &mut self.retry_states.gene,
            &options,
            move || api.gene_details(symbol),
        )
        .await
    }

    /// Fetch the scores of all genes.
    pub async fn fetch_gene_scores(&mut self) -> Result<Sourced<Value>, Report> {
        self.retry_states.gene.reset();
        let api = &self.gene_api;
        let key = cache_key("gene-scores", "all", &BTreeMap::new());
        fetch_cached(
            &mut self.cache,
            &key,
            GENE_SCORES_TTL,
            &mut self.retry_states.gene,
            &self.retry_options,
            move || api.gene_scores(),
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Variants

    /// Annotate one variant. The input is normalized and validated first.
    ///
    /// The cache key includes the parameters that change the response: output
    /// format, filter and genome assembly.
    pub async fn query_variant(&mut self, input: &str, options: VariantOptions) -> Result<Sourced<VariantOutput>, Report> {
        let variant = normalize_variant(input);
        validate_variant(&variant)?;
        self.retry_states.variant.reset();

        let format = options.output;
        let key = cache_key("variant", &variant, &options.cache_params());
        let request = VariantRequest { input: VariantInput::Single(variant), options };
        let api = &self.variant_api;
        let request = &request;
        let operation = move || async move { Ok::<Value, ApiError>(api.analyze(request).await?.into_value()) };

        let sourced = fetch_cached(
            &mut self.cache,
            &key,
            VARIANT_TTL,
            &mut self.retry_states.variant,
            &self.retry_options,
            operation,
        )
        .await?;
        Ok(sourced.map(|value| VariantOutput::from_value(value, format)))
    }

    /// Annotate several variants in one request. Batches are never cached and
    /// are retried as one unit.
    pub async fn query_variants_batch(&mut self, inputs: &[String], options: VariantOptions) -> Result<VariantOutput, Report> {
        let variants: Vec<String> = inputs.iter().map(|input| normalize_variant(input)).collect();
        for variant in &variants {
            validate_variant(variant)?;
        }
        self.retry_states.variant.reset();
        info!("Querying a batch of {} variants.", variants.len());

        let request = VariantRequest { input: VariantInput::Batch(variants), options };
        let api = &self.variant_api;
        let request = &request;
        let output =
            retry_with_backoff(move || api.analyze(request), &self.retry_options, Some(&mut self.retry_states.variant))
                .await?;
        Ok(output)
    }

    // ------------------------------------------------------------------------
    // Scoring

    /// Combine the three sub-scores of a variant.
    ///
    /// The inheritance score is derived from the pattern and optional segregation
    /// probability with the configured [`InheritanceConfig`].
    pub fn score_variant(
        &self,
        gene_score: f64,
        variant_score: f64,
        inheritance: &str,
        segregation: Option<f64>,
    ) -> ScoreComponents {
        let inheritance_score = self.inheritance.calculate_inheritance_score(inheritance, segregation);
        ScoreComponents::new(gene_score, variant_score, inheritance_score)
    }

    /// Fetch the annotation of a variant and the details of its prioritized gene, then score it.
    pub async fn assess_variant(
        &mut self,
        input: &str,
        inheritance: &str,
        segregation: Option<f64>,
        options: VariantOptions,
    ) -> Result<Assessment, Report> {
        let options = VariantOptions { output: OutputFormat::Json, ..options };
        let annotation = self.query_variant(input, options).await?.data.into_value();

        let first = annotation.get("annotationData").and_then(|a| a.get(0)).unwrap_or(&annotation);
        let gene_symbol = prioritize_gene_symbol(first)
            .ok_or_else(|| eyre!("No gene symbol found in the annotation of {input:?}."))?;
        let variant_score = variant_score(&annotation)
            .ok_or_else(|| eyre!("No variant score found in the annotation of {input:?}."))
            .suggestion("Provide the variant score directly with --variant-score.")?;

        let details = self.fetch_gene_details(&gene_symbol).await?.data;
        let gene_score = gene_score(&details)
            .ok_or_else(|| eyre!("No gene score found in the details of {gene_symbol}."))
            .suggestion("Provide the gene score directly with --gene-score.")?;

        let components = self.score_variant(gene_score, variant_score, inheritance, segregation);
        Ok(Assessment {
            variant: normalize_variant(input),
            gene_symbol,
            inheritance: inheritance.to_string(),
            segregation,
            ncs: components.ncs(),
            priority: components.priority(),
            components,
        })
    }

    /// Assess every entry of a batch with [`assess_variant`](Self::assess_variant).
    ///
    /// A failed entry keeps its error in its result and does not stop the batch.
    pub async fn assess_batch(&mut self, entries: &[BatchEntry], options: VariantOptions) -> Vec<BatchResult> {
        let mut results = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            info!("Assessing variant {} of {}: {}", i + 1, entries.len(), entry.variant);
            let outcome = self
                .assess_variant(&entry.variant, &entry.inheritance, entry.segregation, options.clone())
                .await
                .map_err(|e| {
                    warn!("Failed to assess {}: {e}", entry.variant);
                    e.to_string()
                });
            results.push(BatchResult { entry: entry.clone(), outcome });
        }
        results
    }
}
