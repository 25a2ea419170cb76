//! Filtering and rendering of variant annotations.

use crate::annotation::prioritize_gene_symbol;
use crate::ApiError;

use indoc::formatdoc;
use itertools::Itertools;
use log::{debug, warn};
use serde_json::Value;

/// Columns of delimited output, one row per transcript consequence.
pub const DELIMITED_COLUMNS: &[&str] = &[
    "input",
    "seq_region_name",
    "start",
    "allele_string",
    "most_severe_consequence",
    "transcript_id",
    "gene_symbol",
    "impact",
    "consequence_terms",
    "hgvsc",
    "hgvsp",
    "mane",
    "cadd_phred",
    "nephro_variant_score",
];

// ----------------------------------------------------------------------------
// Filter
// ----------------------------------------------------------------------------

/// A condition on a transcript consequence field.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub field: String,
    pub value: String,
    pub negate: bool,
}

impl Condition {
    /// Returns true if the transcript consequence satisfies the condition.
    ///
    /// List fields match if any element matches. A missing field only satisfies a negated condition.
    pub fn matches(&self, transcript: &Value) -> bool {
        let found = match transcript.get(&self.field) {
            Some(Value::Array(values)) => values.iter().any(|v| text(v) == self.value),
            Some(value) => text(value) == self.value,
            None => false,
        };
        found != self.negate
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a comma-separated list of `field=value` or `field!=value` conditions.
///
/// ```rust
/// use ncscore::api::format::parse_filter;
///
/// let conditions = parse_filter("impact=HIGH, gene_symbol!=TTN")?;
/// assert_eq!(conditions.len(), 2);
/// assert!(conditions[1].negate);
/// assert!(parse_filter("")?.is_empty());
/// assert!(parse_filter("impact").is_err());
/// # Ok::<(), ncscore::ApiError>(())
/// ```
pub fn parse_filter(filter: &str) -> Result<Vec<Condition>, ApiError> {
    filter
        .split(',')
        .map(str::trim)
        .filter(|condition| !condition.is_empty())
        .map(|condition| {
            let (field, value, negate) = match (condition.split_once("!="), condition.split_once('=')) {
                (Some((field, value)), _) => (field, value, true),
                (None, Some((field, value))) => (field, value, false),
                (None, None) => {
                    return Err(ApiError::InvalidInput(format!(
                        "Invalid filter condition {condition:?}, expected field=value or field!=value"
                    )))
                }
            };
            let field = field.trim();
            if field.is_empty() {
                return Err(ApiError::InvalidInput(format!("Filter condition has no field: {condition:?}")));
            }
            Ok(Condition { field: field.to_string(), value: value.trim().to_string(), negate })
        })
        .collect()
}

/// Keep only the transcript consequences that satisfy every condition.
pub fn apply_filter(annotations: &mut [Value], conditions: &[Condition]) {
    if conditions.is_empty() {
        return;
    }
    for annotation in annotations.iter_mut() {
        if let Some(Value::Array(transcripts)) = annotation.get_mut("transcript_consequences") {
            let before = transcripts.len();
            transcripts.retain(|transcript| conditions.iter().all(|c| c.matches(transcript)));
            debug!("Filter kept {} of {before} transcript consequences.", transcripts.len());
        }
    }
}

// ----------------------------------------------------------------------------
// Delimited
// ----------------------------------------------------------------------------

fn cell(annotation: &Value, transcript: Option<&Value>, column: &str) -> String {
    let value = transcript.and_then(|t| t.get(column)).or_else(|| annotation.get(column));
    match value {
        Some(Value::Array(values)) => values.iter().map(text).join("&"),
        Some(value) => text(value),
        None => String::new(),
    }
}

/// Render annotations as delimited text with a header row.
///
/// Annotations without transcript consequences produce a single row.
pub fn to_delimited(annotations: &[Value], delimiter: u8) -> Result<String, ApiError> {
    let format = match delimiter {
        b'\t' => "TSV",
        _ => "CSV",
    };
    let render_error = |message: String| ApiError::Render { format: format.to_string(), message };
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());

    writer.write_record(DELIMITED_COLUMNS).map_err(|e| render_error(e.to_string()))?;
    for annotation in annotations {
        let transcripts = crate::annotation::transcript_consequences(annotation);
        let transcripts: Vec<Option<&Value>> = match transcripts.is_empty() {
            true => vec![None],
            false => transcripts.iter().map(Some).collect(),
        };
        for transcript in transcripts {
            let row = DELIMITED_COLUMNS.iter().map(|column| cell(annotation, transcript, column));
            writer.write_record(row).map_err(|e| render_error(e.to_string()))?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| render_error(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| render_error(e.to_string()))
}

// ----------------------------------------------------------------------------
// VCF
// ----------------------------------------------------------------------------

/// Render annotations as a minimal VCFv4.2.
///
/// Position and alleles come from the VEP `input` region line. Annotations
/// without one are skipped.
pub fn to_vcf(annotations: &[Value]) -> String {
    let mut vcf = formatdoc! {"
        ##fileformat=VCFv4.2
        ##source={}-{}
        ##INFO=<ID=CSQ_MOST_SEVERE,Number=1,Type=String,Description=\"Most severe consequence\">
        ##INFO=<ID=GENE,Number=1,Type=String,Description=\"Prioritized gene symbol\">
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
        ",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    };
    if !vcf.ends_with('\n') {
        vcf.push('\n');
    }

    for annotation in annotations {
        let input = annotation.get("input").and_then(Value::as_str).unwrap_or_default();
        let fields = input.split_whitespace().collect_vec();
        if fields.len() < 5 {
            warn!("Skipping annotation without a VCF region line: {input:?}");
            continue;
        }
        let id = annotation.get("id").and_then(Value::as_str).filter(|id| !id.contains(' ')).unwrap_or(fields[2]);
        let mut info = Vec::new();
        if let Some(consequence) = annotation.get("most_severe_consequence").and_then(Value::as_str) {
            info.push(format!("CSQ_MOST_SEVERE={consequence}"));
        }
        if let Some(symbol) = prioritize_gene_symbol(annotation) {
            info.push(format!("GENE={symbol}"));
        }
        let info = match info.is_empty() {
            true => ".".to_string(),
            false => info.join(";"),
        };
        vcf.push_str(&[fields[0], fields[1], id, fields[3], fields[4], ".", ".", info.as_str()].join("\t"));
        vcf.push('\n');
    }

    vcf
}
