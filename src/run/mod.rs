//! Runtime of the CLI [commands](crate::cli::Command).


use crate::annotation::gene_score;
use crate::batch::{self, read_batch};
use crate::api::{EnsemblVariantApi, GeneApi, GeneApiConfig, HttpGeneApi, ScoringConfig, VariantApi, VariantOptions, VariantOutput};
use crate::cache::{CacheStats, FileStore, ResponseCache, SessionStore, Settings, SETTINGS_FILE};
use crate::cli::{cache, GeneArgs, GlobalArgs, ScoreArgs, VariantArgs};
use crate::client::NcsClient;
use crate::variant::validate_segregation;

use color_eyre::eyre::{eyre, Report, Result};
use color_eyre::Help;
use log::{info, warn};
use ncscore_scoring::{round_score, InheritanceConfig, InheritancePattern, ScoreComponents};
use std::path::PathBuf;
use std::str::FromStr;
use strum::IntoEnumIterator;
use tabled::Table;

/// Client of the network APIs, caching to the state directory.
pub type CliClient = NcsClient<Option<HttpGeneApi>, EnsemblVariantApi, FileStore>;

// ----------------------------------------------------------------------------
// Setup
// ----------------------------------------------------------------------------

/// Returns the gene API locations: the config file if given, otherwise the base URL.
pub fn gene_api_config(global: &GlobalArgs) -> Result<Option<GeneApiConfig>, Report> {
    match (&global.gene_api_config, &global.gene_api_url) {
        (Some(path), _) => Ok(Some(GeneApiConfig::read(path)?)),
        (None, Some(url)) => Ok(Some(GeneApiConfig::from_base_url(url))),
        (None, None) => Ok(None),
    }
}

/// Returns the inheritance scoring configuration, the built-in default unless a file is given.
pub fn inheritance_config(global: &GlobalArgs) -> Result<InheritanceConfig, Report> {
    match &global.inheritance_config {
        Some(path) => {
            info!("Importing inheritance config: {path:?}");
            InheritanceConfig::read(path)
        }
        None => Ok(InheritanceConfig::default()),
    }
}

pub fn settings_path(global: &GlobalArgs) -> PathBuf {
    global.state_dir.join(SETTINGS_FILE)
}

/// Returns the session cache of the state directory, enabled according to the
/// persistent settings unless `--no-cache` is set.
pub fn response_cache(global: &GlobalArgs) -> Result<ResponseCache<FileStore>, Report> {
    let settings = Settings::read(&settings_path(global))?;
    let mut cache = ResponseCache::new(FileStore::in_dir(&global.state_dir));
    cache.set_enabled(settings.cache_enabled && !global.no_cache);
    Ok(cache)
}

pub fn client(global: &GlobalArgs) -> Result<CliClient, Report> {
    let gene_api = gene_api_config(global)?.map(HttpGeneApi::new).transpose()?;
    let client = NcsClient::new(gene_api, EnsemblVariantApi::new()?, response_cache(global)?)
        .with_inheritance_config(inheritance_config(global)?);
    Ok(client)
}

// ----------------------------------------------------------------------------
// Variant
// ----------------------------------------------------------------------------

/// Annotate the variants of `args`. A single variant goes through the cache, several are one batch.
pub async fn variant<G, V, S>(client: &mut NcsClient<G, V, S>, args: &VariantArgs) -> Result<VariantOutput, Report>
where
    G: GeneApi,
    V: VariantApi,
    S: SessionStore,
{
    let scoring_config = match (&args.variable_assignment, &args.formula) {
        (Some(variable_assignment), Some(formula)) => Some(ScoringConfig::read(variable_assignment, formula)?),
        _ => None,
    };
    let options = VariantOptions {
        output: args.output,
        filter: args.filter.clone(),
        scoring_config,
        assembly: args.assembly,
        ..Default::default()
    };

    match args.input.as_slice() {
        [] => Err(eyre!("No variant was given.")),
        [input] => {
            let output = client.query_variant(input, options).await?;
            if let Some(cached_at) = output.source.cached_at.filter(|_| output.source.from_cache) {
                info!("Using cached annotation from {cached_at}.");
            }
            Ok(output.data)
        }
        inputs => client.query_variants_batch(inputs, options).await,
    }
}

// ----------------------------------------------------------------------------
// Gene
// ----------------------------------------------------------------------------

/// Returns a table of the gene's HGNC identifier and score, followed by the
/// full details when `--json` is set.
pub async fn gene<G, V, S>(client: &mut NcsClient<G, V, S>, args: &GeneArgs) -> Result<String, Report>
where
    G: GeneApi,
    V: VariantApi,
    S: SessionStore,
{
    let symbol = args.symbol.trim();
    let details = client.fetch_gene_details(symbol).await?;

    // the identifier is a convenience, the details are what was asked for
    let hgnc_id = match client.fetch_gene_index().await {
        Ok(index) => index.data.hgnc_id(symbol).unwrap_or_default().to_string(),
        Err(e) => {
            warn!("Failed to fetch the gene index: {e}");
            String::new()
        }
    };

    let score = gene_score(&details.data).map(|s| round_score(s).to_string()).unwrap_or_default();
    let source = match details.source.from_cache {
        true => "cache",
        false => "api",
    };

    let mut builder = tabled::builder::Builder::default();
    builder.push_record(vec!["Symbol", "HGNC ID", "Gene Score", "Source"]);
    builder.push_record(vec![symbol.to_string(), hgnc_id, score, source.to_string()]);
    let mut output = builder.build().to_string();

    if args.json {
        output = format!("{output}\n{}", serde_json::to_string_pretty(&details.data)?);
    }
    Ok(output)
}

// ----------------------------------------------------------------------------
// Score
// ----------------------------------------------------------------------------

/// Returns the sub-scores of `args`, fetching the ones that were not given directly.
pub async fn score<G, V, S>(client: &mut NcsClient<G, V, S>, args: &ScoreArgs) -> Result<ScoreComponents, Report>
where
    G: GeneApi,
    V: VariantApi,
    S: SessionStore,
{
    // reject unknown labels here, the scorer itself falls back silently
    let pattern = InheritancePattern::from_str(&args.inheritance)?;
    let segregation = validate_segregation(args.segregation.as_deref().unwrap_or_default())?;
    if segregation.is_some() && !client.inheritance.segregation_applicable(pattern.label()) {
        warn!("Segregation is not applicable to {pattern}, ignoring it.");
    }
    if client.inheritance.requires_second_variant(pattern.label()) {
        info!("{pattern} requires a second variant in the same gene.");
    }

    if let Some(variant) = &args.variant {
        let options = VariantOptions { assembly: args.assembly, ..Default::default() };
        let assessment = client.assess_variant(variant, pattern.label(), segregation, options).await?;
        info!("Scored {} in gene {}.", assessment.variant, assessment.gene_symbol);
        return Ok(assessment.components);
    }

    let gene_score = match (args.gene_score, &args.gene) {
        (Some(score), _) => score,
        (None, Some(symbol)) => {
            let details = client.fetch_gene_details(symbol).await?;
            gene_score(&details.data).ok_or_else(|| eyre!("No gene score found in the details of {symbol}."))?
        }
        (None, None) => Err(eyre!("A gene score is required."))
            .suggestion("Use --gene-score, --gene <SYMBOL> or --variant <VARIANT>.")?,
    };
    let variant_score = match args.variant_score {
        Some(score) => score,
        None => Err(eyre!("A variant score is required."))
            .suggestion("Use --variant-score or --variant <VARIANT>.")?,
    };

    Ok(client.score_variant(gene_score, variant_score, pattern.label(), segregation))
}

/// Assess every variant of the `--batch` file, returning the results as CSV.
pub async fn score_batch<G, V, S>(client: &mut NcsClient<G, V, S>, args: &ScoreArgs) -> Result<String, Report>
where
    G: GeneApi,
    V: VariantApi,
    S: SessionStore,
{
    let path = args.batch.as_ref().ok_or_else(|| eyre!("A batch file is required."))?;
    let default_inheritance = InheritancePattern::from_str(&args.inheritance)?;
    info!("Importing batch: {path:?}");
    let entries = read_batch(path, default_inheritance.label())?;
    if entries.is_empty() {
        return Err(eyre!("No variants found in the batch: {path:?}"));
    }

    let options = VariantOptions { assembly: args.assembly, ..Default::default() };
    let results = client.assess_batch(&entries, options).await;
    let failed = results.iter().filter(|result| result.outcome.is_err()).count();
    match failed {
        0 => info!("Assessed {} variant(s).", results.len()),
        _ => warn!("Failed to assess {failed} of {} variant(s).", results.len()),
    }
    batch::to_csv(&results)
}

/// Returns a table of the sub-scores, the NCS and its priority.
pub fn score_table(components: &ScoreComponents) -> Table {
    let mut builder = tabled::builder::Builder::default();
    builder.push_record(vec!["Component", "Score"]);
    builder.push_record(vec!["Gene".to_string(), round_score(components.gene_score).to_string()]);
    builder.push_record(vec!["Variant".to_string(), round_score(components.variant_score).to_string()]);
    builder.push_record(vec!["Inheritance".to_string(), round_score(components.inheritance_score).to_string()]);
    builder.push_record(vec!["NCS".to_string(), round_score(components.ncs()).to_string()]);
    builder.push_record(vec!["Priority".to_string(), components.priority().to_string()]);
    builder.build()
}

// ----------------------------------------------------------------------------
// Cache
// ----------------------------------------------------------------------------

/// Run a cache command against the state directory, returning a message to print.
pub fn cache(global: &GlobalArgs, args: &cache::Args) -> Result<String, Report> {
    let path = settings_path(global);
    match &args.command {
        cache::Command::Stats => {
            let cache = response_cache(global)?;
            Ok(cache_stats_table(&cache.stats(), cache.is_enabled()).to_string())
        }
        cache::Command::Clear(args) => {
            let mut cache = response_cache(global)?;
            let removed = cache.clear(args.kind.as_deref());
            Ok(match &args.kind {
                Some(kind) => format!("Removed {removed} cached {kind} response(s)."),
                None => format!("Removed {removed} cached response(s)."),
            })
        }
        cache::Command::Enable | cache::Command::Disable => {
            let mut settings = Settings::read(&path)?;
            settings.cache_enabled = matches!(args.command, cache::Command::Enable);
            settings.write(&path)?;
            let state = if settings.cache_enabled { "enabled" } else { "disabled" };
            Ok(format!("Response cache {state}."))
        }
    }
}

/// Returns a table of the cache counters.
pub fn cache_stats_table(stats: &CacheStats, enabled: bool) -> Table {
    let mut builder = tabled::builder::Builder::default();
    builder.push_record(vec!["Enabled", "Items", "Requests", "Hits", "Misses", "Bypassed", "Hit Rate"]);
    builder.push_record(vec![
        enabled.to_string(),
        stats.item_count.to_string(),
        stats.total_requests.to_string(),
        stats.hits.to_string(),
        stats.misses.to_string(),
        stats.bypassed.to_string(),
        format!("{:.1}%", stats.hit_rate),
    ]);
    builder.build()
}

// ----------------------------------------------------------------------------
// Inheritance
// ----------------------------------------------------------------------------

/// Returns a table of every inheritance pattern and how it is scored.
pub fn inheritance_table(config: &InheritanceConfig) -> Table {
    let mut builder = tabled::builder::Builder::default();
    builder.push_record(vec!["Pattern", "Base Score", "Segregation", "Second Variant"]);
    InheritancePattern::iter().for_each(|pattern| {
        let label = pattern.label();
        let yes_no = |b: bool| String::from(if b { "yes" } else { "no" });
        builder.push_record(vec![
            label.to_string(),
            config.base_score(label).to_string(),
            yes_no(config.segregation_applicable(label)),
            yes_no(config.requires_second_variant(label)),
        ]);
    });
    builder.build()
}
