//! Variant annotation requests and the Ensembl-backed [`VariantApi`](super::VariantApi).

use crate::api::format::{apply_filter, parse_filter, to_delimited, to_vcf};
use crate::api::{ScoringConfig, ScoringModel};
use crate::variant::{is_hgvs, VcfVariant};
use crate::ApiError;

#[cfg(feature = "cli")]
use clap::ValueEnum;
use color_eyre::eyre::{eyre, Report, Result};
use color_eyre::Help;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

// ----------------------------------------------------------------------------
// Assembly
// ----------------------------------------------------------------------------

/// Genome assembly, which selects the annotation service.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum Assembly {
    #[default]
    #[cfg_attr(feature = "cli", value(name = "GRCh38"))]
    GRCh38,
    #[cfg_attr(feature = "cli", value(name = "GRCh37"))]
    GRCh37,
}

impl Assembly {
    /// Base URL of the Ensembl REST service for this assembly.
    pub fn base_url(&self) -> &'static str {
        match self {
            Assembly::GRCh38 => "https://rest.ensembl.org",
            Assembly::GRCh37 => "https://grch37.rest.ensembl.org",
        }
    }
}

impl Display for Assembly {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Assembly::GRCh38 => "GRCh38",
            Assembly::GRCh37 => "GRCh37",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Assembly {
    type Err = Report;

    fn from_str(name: &str) -> Result<Self, Report> {
        match name.to_lowercase().as_str() {
            "grch38" | "hg38" => Ok(Assembly::GRCh38),
            "grch37" | "hg19" => Ok(Assembly::GRCh37),
            _ => Err(eyre!("Unknown genome assembly: {name}")).suggestion("Please choose from: GRCh38, GRCh37"),
        }
    }
}

// ----------------------------------------------------------------------------
// Output Format
// ----------------------------------------------------------------------------

/// Format of a variant annotation result.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Tsv,
    Vcf,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = format!("{self:?}").to_uppercase();
        write!(f, "{name}")
    }
}

impl FromStr for OutputFormat {
    type Err = Report;

    fn from_str(name: &str) -> Result<Self, Report> {
        match name.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "vcf" => Ok(OutputFormat::Vcf),
            _ => Err(eyre!("Unknown output format: {name}")).suggestion("Please choose from: JSON, CSV, TSV, VCF"),
        }
    }
}

// ----------------------------------------------------------------------------
// Variant Request
// ----------------------------------------------------------------------------

/// One variant or a batch of variants.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariantInput {
    Single(String),
    Batch(Vec<String>),
}

impl VariantInput {
    pub fn variants(&self) -> Vec<&str> {
        match self {
            VariantInput::Single(variant) => vec![variant.as_str()],
            VariantInput::Batch(variants) => variants.iter().map(String::as_str).collect(),
        }
    }
}

/// Options of a variant annotation request.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct VariantOptions {
    /// Options of the HGVS to VCF recoder.
    pub recoder_options: BTreeMap<String, String>,
    /// Options of the consequence annotation.
    pub vep_options: BTreeMap<String, String>,
    pub output: OutputFormat,
    /// Comma-separated `field=value` conditions on transcript consequences.
    pub filter: String,
    /// Computes the variant score, `None` uses [`ScoringConfig::bundled`].
    pub scoring_config: Option<ScoringConfig>,
    pub assembly: Assembly,
}

impl Default for VariantOptions {
    fn default() -> Self {
        let options = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
        };
        VariantOptions {
            recoder_options: options(&[("vcf_string", "1")]),
            vep_options: options(&[("CADD", "1"), ("hgvs", "1"), ("merged", "1"), ("mane", "1")]),
            output: OutputFormat::default(),
            filter: String::new(),
            scoring_config: None,
            assembly: Assembly::default(),
        }
    }
}

impl VariantOptions {
    /// Parameters that change the response, used to fingerprint cached results.
    pub fn cache_params(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("assembly".to_string(), json!(self.assembly.to_string())),
            ("filter".to_string(), json!(self.filter)),
            ("output".to_string(), json!(self.output.to_string())),
            ("recoder_options".to_string(), json!(self.recoder_options)),
            ("scoring_config".to_string(), json!(self.scoring_config)),
            ("vep_options".to_string(), json!(self.vep_options)),
        ])
    }

    /// Compile the scoring config, the bundled one if none is set.
    pub fn scoring_model(&self) -> Result<ScoringModel, Report> {
        match &self.scoring_config {
            Some(config) => config.model(),
            None => ScoringConfig::bundled()?.model(),
        }
    }
}

/// A variant annotation request.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct VariantRequest {
    pub input: VariantInput,
    pub options: VariantOptions,
}

/// Result of a variant annotation: structured for JSON, text otherwise.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariantOutput {
    Json(Value),
    Text(String),
}

impl VariantOutput {
    /// Restore an output from its cached JSON value.
    pub fn from_value(value: Value, format: OutputFormat) -> Self {
        match (format, value) {
            (OutputFormat::Json, value) => VariantOutput::Json(value),
            (_, Value::String(text)) => VariantOutput::Text(text),
            (_, value) => VariantOutput::Json(value),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            VariantOutput::Json(value) => value,
            VariantOutput::Text(text) => Value::String(text),
        }
    }
}

impl Display for VariantOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantOutput::Json(value) => {
                let json = serde_json::to_string_pretty(value).map_err(|_| std::fmt::Error)?;
                write!(f, "{json}")
            }
            VariantOutput::Text(text) => write!(f, "{text}"),
        }
    }
}

// ----------------------------------------------------------------------------
// Ensembl Variant Api
// ----------------------------------------------------------------------------

/// Variant annotation through the Ensembl REST API.
///
/// VCF-like variants are annotated directly with VEP. HGVS variants are first
/// recoded into VCF coordinates with the Variant Recoder.
#[cfg(feature = "download")]
#[derive(Clone, Debug)]
pub struct EnsemblVariantApi {
    client: reqwest::Client,
    /// Overrides the assembly's base URL.
    pub base_url: Option<String>,
}

#[cfg(feature = "download")]
impl EnsemblVariantApi {
    pub fn new() -> Result<Self, Report> {
        Ok(EnsemblVariantApi { client: super::http_client()?, base_url: None })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    fn base_url(&self, assembly: Assembly) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => assembly.base_url().to_string(),
        }
    }

    /// Recode HGVS variants into VEP region lines.
    async fn recode(&self, base_url: &str, variants: &[&str], options: &VariantOptions) -> Result<Vec<String>, ApiError> {
        let url = format!("{base_url}/variant_recoder/homo_sapiens");
        let mut body = json!({ "ids": variants });
        for (key, value) in &options.recoder_options {
            body[key] = json!(value);
        }
        debug!("Recoding {} HGVS variant(s): {url}", variants.len());
        let recoded = super::post_json(&self.client, &url, &body).await?;

        // [{"<allele>": {"vcf_string": ["1-55051215-G-GA"], ...}}, ...]
        let regions: Vec<String> = recoded
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .flat_map(|alleles| alleles.values())
            .filter_map(|allele| allele.get("vcf_string"))
            .flat_map(|vcf| match vcf {
                Value::Array(values) => values.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>(),
                Value::String(value) => vec![value.clone()],
                _ => Vec::new(),
            })
            .filter_map(|vcf| VcfVariant::parse(&vcf).map(|v| v.to_region()))
            .collect();

        if regions.is_empty() {
            return Err(ApiError::InvalidInput(format!("No genomic coordinates found for: {}", variants.join(", "))));
        }
        Ok(regions)
    }
}

#[cfg(feature = "download")]
impl super::VariantApi for EnsemblVariantApi {
    async fn analyze(&self, request: &VariantRequest) -> Result<VariantOutput, ApiError> {
        let options = &request.options;
        let variants = request.input.variants();
        if variants.is_empty() {
            return Err(ApiError::InvalidInput("No variants to annotate.".to_string()));
        }
        let conditions = parse_filter(&options.filter)?;
        let model = options.scoring_model().map_err(|e| ApiError::InvalidInput(format!("Invalid scoring config: {e}")))?;
        let base_url = self.base_url(options.assembly);

        let mut regions = Vec::new();
        let mut hgvs = Vec::new();
        for variant in &variants {
            match VcfVariant::parse(variant) {
                Some(vcf) => regions.push(vcf.to_region()),
                None if is_hgvs(variant) => hgvs.push(*variant),
                None => return Err(ApiError::InvalidInput(format!("Invalid variant: {variant:?}"))),
            }
        }
        if !hgvs.is_empty() {
            regions.extend(self.recode(&base_url, &hgvs, options).await?);
        }

        let url = format!("{base_url}/vep/homo_sapiens/region");
        let mut body = json!({ "variants": regions });
        for (key, value) in &options.vep_options {
            body[key] = json!(value);
        }
        info!("Annotating {} variant(s) on {}.", regions.len(), options.assembly);
        let annotations = super::post_json(&self.client, &url, &body).await?;
        let mut annotations = match annotations {
            Value::Array(annotations) => annotations,
            other => {
                return Err(ApiError::Decode { url, message: format!("Expected a list of annotations, found: {other}") })
            }
        };
        model.apply(&mut annotations);
        apply_filter(&mut annotations, &conditions);

        let output = match options.output {
            OutputFormat::Json => VariantOutput::Json(json!({
                "meta": {
                    "input": request.input,
                    "assembly": options.assembly.to_string(),
                    "filter": options.filter,
                    "scoring_config": options.scoring_config,
                },
                "annotationData": annotations,
            })),
            OutputFormat::Csv => VariantOutput::Text(to_delimited(&annotations, b',')?),
            OutputFormat::Tsv => VariantOutput::Text(to_delimited(&annotations, b'\t')?),
            OutputFormat::Vcf => VariantOutput::Text(to_vcf(&annotations)),
        };
        Ok(output)
    }
}
