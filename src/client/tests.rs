use crate::api::fake::{FakeGeneApi, FakeVariantApi};
use crate::api::{Assembly, OutputFormat, ScoringConfig, VariantOptions, VariantOutput};
use crate::batch::BatchEntry;
use crate::cache::{MemoryStore, ResponseCache};
use crate::client::NcsClient;
use crate::retry::{ErrorConfig, RetryOptions};
use crate::ApiError;

use color_eyre::eyre::{Report, Result};
use ncscore_scoring::Priority;
use std::collections::BTreeMap;

fn client() -> NcsClient<FakeGeneApi, FakeVariantApi> {
    NcsClient::new(FakeGeneApi::new(), FakeVariantApi::default(), ResponseCache::new(MemoryStore::new()))
}

// ----------------------------------------------------------------------------
// Genes

#[tokio::test(start_paused = true)]
async fn gene_details_cached() -> Result<(), Report> {
    let mut client = client();

    let fresh = client.fetch_gene_details("NPHS1").await?;
    assert!(!fresh.source.from_cache);
    assert_eq!(fresh.data["NCS"], 0.8);

    let cached = client.fetch_gene_details("NPHS1").await?;
    assert!(cached.source.from_cache);
    assert_eq!(cached.source.cached_at, fresh.source.cached_at);
    assert_eq!(client.gene_api.calls.get(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn gene_not_found_never_retried() -> Result<(), Report> {
    // even when the general policy retries 404
    let options = RetryOptions::default().error_config(ErrorConfig { retryable_status_codes: vec![404], ..Default::default() });
    let mut client = client().with_retry_options(options);

    let error = client.fetch_gene_details("NOTAGENE").await.expect_err("gene does not exist");
    let error = error.downcast_ref::<ApiError>().expect("error should be an ApiError");
    assert!(matches!(error, ApiError::Status { status: 404, .. }));
    assert_eq!(client.gene_api.calls.get(), 1);
    assert_eq!(client.retry_states.gene.attempts, 1);
    assert!(client.cache.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn gene_details_transient_failures() -> Result<(), Report> {
    let mut client = client();
    client.gene_api.failures.set(2);

    let details = client.fetch_gene_details("PCSK9").await?;
    assert_eq!(details.data["symbol"], "PCSK9");
    assert_eq!(client.gene_api.calls.get(), 3);
    assert_eq!(client.retry_states.gene.attempts, 2);
    assert!(!client.retry_states.gene.in_progress);

    // a new operation starts from a clean state
    client.gene_api.failures.set(3);
    let error = client.fetch_gene_scores().await.expect_err("retries exhausted");
    assert!(matches!(error.downcast_ref::<ApiError>(), Some(ApiError::Status { status: 503, .. })));
    assert_eq!(client.retry_states.gene.attempts, 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn gene_index_aligned() -> Result<(), Report> {
    let mut client = client();
    let index = client.fetch_gene_index().await?;
    assert!(!index.source.from_cache);
    assert_eq!(index.data.hgnc_id("pcsk9"), Some("20001"));
    assert!(!index.data.contains("NPHS2"));

    let index = client.fetch_gene_index().await?;
    assert!(index.source.from_cache);
    assert_eq!(client.gene_api.calls.get(), 2);

    let symbols = client.fetch_symbols_index().await?;
    assert_eq!(symbols.data, ["NPHS1", "PCSK9"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn gene_index_misaligned() -> Result<(), Report> {
    let mut client = client();
    client.gene_api.hgnc_ids.pop();
    assert!(client.fetch_gene_index().await.is_err());
    Ok(())
}

// ----------------------------------------------------------------------------
// Variants

#[tokio::test(start_paused = true)]
async fn variant_cache_keyed_by_params() -> Result<(), Report> {
    let mut client = client();
    let grch37 = VariantOptions { assembly: Assembly::GRCh37, ..Default::default() };

    let first = client.query_variant("1-55051215-G-GA", VariantOptions::default()).await?;
    assert!(!first.source.from_cache);
    // normalized input hits the same entry
    let second = client.query_variant("chr1:55051215:G:GA", VariantOptions::default()).await?;
    assert!(second.source.from_cache);
    assert_eq!(first.data, second.data);

    let other = client.query_variant("1-55051215-G-GA", grch37).await?;
    assert!(!other.source.from_cache);
    assert_eq!(client.variant_api.requests.borrow().len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn variant_cache_keyed_by_scoring_and_service_options() -> Result<(), Report> {
    let mut client = client();
    let config = |score: &str| {
        ScoringConfig::parse(r#"{"variables": {}}"#, &format!(r#"{{"formulas": [{{"nephro_variant_score": "{score}"}}]}}"#))
    };
    let low = VariantOptions { scoring_config: Some(config("0.2")?), ..Default::default() };
    let high = VariantOptions { scoring_config: Some(config("0.8")?), ..Default::default() };

    assert!(!client.query_variant("1-55051215-G-GA", low.clone()).await?.source.from_cache);
    assert!(client.query_variant("1-55051215-G-GA", low).await?.source.from_cache);
    assert!(!client.query_variant("1-55051215-G-GA", high.clone()).await?.source.from_cache);

    let mut vep = VariantOptions::default();
    vep.vep_options.insert("CADD".to_string(), "0".to_string());
    assert!(!client.query_variant("1-55051215-G-GA", vep).await?.source.from_cache);
    let recoder = VariantOptions { recoder_options: BTreeMap::new(), ..Default::default() };
    assert!(!client.query_variant("1-55051215-G-GA", recoder).await?.source.from_cache);

    let requests = client.variant_api.requests.borrow();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[1].options.scoring_config, high.scoring_config);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn variant_text_output_cached() -> Result<(), Report> {
    let mut client = client();
    let csv = VariantOptions { output: OutputFormat::Csv, ..Default::default() };

    client.query_variant("1-55051215-G-GA", csv.clone()).await?;
    let cached = client.query_variant("1-55051215-G-GA", csv).await?;
    assert!(cached.source.from_cache);
    assert!(matches!(cached.data, VariantOutput::Text(text) if text.starts_with("input,gene_symbol")));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn variant_invalid_input_not_sent() -> Result<(), Report> {
    let mut client = client();
    assert!(client.query_variant("not a variant", VariantOptions::default()).await.is_err());
    assert!(client.variant_api.requests.borrow().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn variant_batch_not_cached() -> Result<(), Report> {
    let mut client = client();
    let inputs = vec!["1-55051215-G-GA".to_string(), "NM_174936.4:c.1A>G".to_string()];

    client.query_variants_batch(&inputs, VariantOptions::default()).await?;
    client.query_variants_batch(&inputs, VariantOptions::default()).await?;
    assert_eq!(client.variant_api.requests.borrow().len(), 2);
    assert!(client.cache.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cache_disabled_always_fetches() -> Result<(), Report> {
    let mut client = client();
    client.cache.set_enabled(false);

    client.fetch_gene_details("NPHS1").await?;
    let details = client.fetch_gene_details("NPHS1").await?;
    assert!(!details.source.from_cache);
    assert_eq!(client.gene_api.calls.get(), 2);
    assert_eq!(client.cache.stats().bypassed, 2);
    Ok(())
}

// ----------------------------------------------------------------------------
// Scoring

#[test]
fn score_variant_denovo() -> Result<(), Report> {
    let client = client();
    let components = client.score_variant(0.6, 0.5, "Denovo", None);
    assert_eq!(components.inheritance_score, 0.95);
    assert!((components.ncs() - 6.3).abs() < 1e-9);
    assert_eq!(components.priority(), Priority::Moderate);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn assess_variant_end_to_end() -> Result<(), Report> {
    let mut client = client();
    let assessment = client.assess_variant(" 1-55051215-G-GA ", "Denovo", None, VariantOptions::default()).await?;

    assert_eq!(assessment.variant, "1-55051215-G-GA");
    assert_eq!(assessment.gene_symbol, "PCSK9");
    assert_eq!(assessment.components.gene_score, 0.6);
    assert_eq!(assessment.components.variant_score, 0.5);
    assert_eq!(assessment.components.inheritance_score, 0.95);
    assert!((assessment.ncs - 6.3).abs() < 1e-9);
    assert_eq!(assessment.priority, Priority::Moderate);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn assess_batch_keeps_going_after_failures() -> Result<(), Report> {
    let mut client = client();
    let entries = vec![
        BatchEntry { variant: "1-55051215-G-GA".to_string(), inheritance: "Denovo".to_string(), segregation: None },
        BatchEntry { variant: "NPHS1".to_string(), inheritance: "Denovo".to_string(), segregation: None },
        BatchEntry {
            variant: "NM_174936.4:c.1A>G".to_string(),
            inheritance: "Homozygous recessive".to_string(),
            segregation: Some(0.001),
        },
    ];
    let results = client.assess_batch(&entries, VariantOptions::default()).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().map(|r| &r.entry).collect::<Vec<_>>(), entries.iter().collect::<Vec<_>>());

    let first = results[0].outcome.as_ref().expect("first variant assessed");
    assert!((first.ncs - 6.3).abs() < 1e-9);
    assert!(results[1].outcome.as_ref().is_err_and(|e| e.contains("Invalid variant")));
    let last = results[2].outcome.as_ref().expect("last variant assessed");
    assert_eq!(last.components.inheritance_score, 1.0);
    assert_eq!(last.priority, Priority::Moderate);

    // the invalid variant is never sent, the gene details are fetched once
    assert_eq!(client.variant_api.requests.borrow().len(), 2);
    assert_eq!(client.gene_api.calls.get(), 1);
    Ok(())
}
