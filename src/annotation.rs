//! Read scores and prioritized transcripts from gene and variant annotations.


use log::debug;
use serde_json::Value;

/// Field of the gene-level score in gene details.
pub const GENE_SCORE_FIELD: &str = "NCS";
/// Field of the variant-level score in variant annotations.
pub const VARIANT_SCORE_FIELD: &str = "nephro_variant_score";
/// Transcript flag marking the MANE Select transcript.
pub const MANE_SELECT: &str = "MANE_Select";

/// Rank of a VEP impact, higher is more severe. Unknown impacts rank 0.
pub fn impact_rank(impact: Option<&str>) -> u8 {
    match impact {
        Some("HIGH") => 4,
        Some("MODERATE") => 3,
        Some("LOW") => 2,
        Some("MODIFIER") => 1,
        _ => 0,
    }
}

fn is_mane_select(transcript: &Value) -> bool {
    match transcript.get("mane") {
        Some(Value::String(mane)) => mane.contains(MANE_SELECT),
        Some(Value::Array(flags)) => flags.iter().any(|flag| flag.as_str().is_some_and(|f| f.contains(MANE_SELECT))),
        _ => false,
    }
}

/// Returns the transcript consequences of a variant annotation.
pub fn transcript_consequences(annotation: &Value) -> &[Value] {
    annotation.get("transcript_consequences").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

/// Returns the most relevant transcript consequence.
///
/// MANE Select transcripts are preferred, then the most severe impact. Ties
/// keep their original order, so the first transcript wins.
///
/// ## Examples
///
/// ```rust
/// use ncscore::annotation::prioritize_transcript;
/// use serde_json::json;
///
/// let transcripts = [
///     json!({"transcript_id": "ENST01", "impact": "MODIFIER"}),
///     json!({"transcript_id": "ENST02", "impact": "HIGH"}),
///     json!({"transcript_id": "ENST03", "impact": "LOW", "mane": ["MANE_Select"]}),
/// ];
/// let transcript = prioritize_transcript(&transcripts).unwrap();
/// assert_eq!(transcript["transcript_id"], "ENST03");
///
/// let transcript = prioritize_transcript(&transcripts[0..2]).unwrap();
/// assert_eq!(transcript["transcript_id"], "ENST02");
/// assert!(prioritize_transcript(&[]).is_none());
/// ```
pub fn prioritize_transcript(transcripts: &[Value]) -> Option<&Value> {
    let rank = |transcript: &&Value| impact_rank(transcript.get("impact").and_then(Value::as_str));
    let mane: Vec<&Value> = transcripts.iter().filter(|t| is_mane_select(t)).collect();
    let candidates = match mane.is_empty() {
        true => transcripts.iter().collect(),
        false => mane,
    };
    // max_by_key returns the last maximum, so search the reversed candidates
    candidates.into_iter().rev().max_by_key(rank)
}

/// Returns the gene symbol of the [prioritized transcript](prioritize_transcript), if any.
pub fn prioritize_gene_symbol(annotation: &Value) -> Option<String> {
    let transcript = prioritize_transcript(transcript_consequences(annotation))?;
    let symbol = transcript.get("gene_symbol")?.as_str()?;
    debug!("Prioritized gene symbol: {symbol}");
    Some(symbol.to_string())
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Returns the gene-level score of gene details.
///
/// ```rust
/// use ncscore::annotation::gene_score;
/// use serde_json::json;
///
/// assert_eq!(gene_score(&json!({"symbol": "NPHS1", "NCS": 0.6})), Some(0.6));
/// assert_eq!(gene_score(&json!([{"symbol": "NPHS1", "NCS": "0.6"}])), Some(0.6));
/// assert_eq!(gene_score(&json!({"symbol": "NPHS1"})), None);
/// ```
pub fn gene_score(details: &Value) -> Option<f64> {
    match details {
        Value::Array(records) => records.iter().find_map(gene_score),
        _ => details.get(GENE_SCORE_FIELD).and_then(numeric),
    }
}

/// Returns the variant-level score of a variant annotation.
///
/// The score is read from the annotation itself, from its `variant_scores` block,
/// or from the first annotation of a `{"annotationData": [...]}` result.
///
/// ```rust
/// use ncscore::annotation::variant_score;
/// use serde_json::json;
///
/// assert_eq!(variant_score(&json!({"nephro_variant_score": 0.5})), Some(0.5));
/// assert_eq!(variant_score(&json!({"variant_scores": {"nephro_variant_score": 0.5}})), Some(0.5));
/// assert_eq!(variant_score(&json!({"annotationData": [{"nephro_variant_score": 0.5}]})), Some(0.5));
/// assert_eq!(variant_score(&json!({"id": "1-55051215-G-GA"})), None);
/// ```
pub fn variant_score(annotation: &Value) -> Option<f64> {
    if let Some(score) = annotation.get(VARIANT_SCORE_FIELD).and_then(numeric) {
        return Some(score);
    }
    if let Some(score) = annotation.get("variant_scores").and_then(|s| s.get(VARIANT_SCORE_FIELD)).and_then(numeric) {
        return Some(score);
    }
    match annotation {
        Value::Array(annotations) => annotations.iter().find_map(variant_score),
        _ => annotation.get("annotationData").and_then(variant_score),
    }
}
