//! Batches of variants to score, and export of their results.
//!
//! A batch has one variant per line, optionally followed by an inheritance
//! pattern and a segregation probability, separated by tabs:
//!
//! ```text
//! # variant                 inheritance             segregation
//! NM_014251.3:c.1339C>T     Denovo                  0.95
//! 17-41197734-C-T           X-linked recessive      0.9
//! 1-55051215-G-GA
//! ```
//!
//! Lines without a tab may use commas instead. Blank lines and `#` comments are skipped.

#[cfg(test)]
mod tests;

use crate::client::Assessment;
use crate::variant::{normalize_variant, validate_segregation};

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use ncscore_scoring::{round_score, InheritancePattern};
use std::path::Path;
use std::str::FromStr;

/// Columns of the CSV export, one row per batch entry.
pub const BATCH_COLUMNS: &[&str] = &[
    "variant",
    "gene_symbol",
    "inheritance",
    "segregation",
    "gene_score",
    "variant_score",
    "inheritance_score",
    "ncs",
    "priority",
    "error",
];

/// Content of a cell without a value.
pub const MISSING: &str = "NA";

// ----------------------------------------------------------------------------
// Batch Entry
// ----------------------------------------------------------------------------

/// A variant to score, with its inheritance pattern and segregation probability.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchEntry {
    pub variant: String,
    pub inheritance: String,
    pub segregation: Option<f64>,
}

impl BatchEntry {
    /// Parse one line of a batch. Lines without a pattern use `default_inheritance`.
    ///
    /// ```rust
    /// use ncscore::batch::BatchEntry;
    ///
    /// let entry = BatchEntry::parse("chr1:55051215:G:GA\tHomozygous recessive\t0.001", "Unknown")?;
    /// assert_eq!(entry.variant, "1-55051215-G-GA");
    /// assert_eq!(entry.inheritance, "Homozygous recessive");
    /// assert_eq!(entry.segregation, Some(0.001));
    ///
    /// let entry = BatchEntry::parse("1-55051215-G-GA", "Denovo")?;
    /// assert_eq!((entry.inheritance.as_str(), entry.segregation), ("Denovo", None));
    /// assert!(BatchEntry::parse("1-55051215-G-GA,Dominant", "Unknown").is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn parse(line: &str, default_inheritance: &str) -> Result<Self, Report> {
        let delimiter = if line.contains('\t') { '\t' } else { ',' };
        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        if fields.len() > 3 {
            return Err(eyre!("Expected at most 3 fields, found {}", fields.len()));
        }

        let variant = normalize_variant(fields.first().copied().unwrap_or_default());
        if variant.is_empty() {
            return Err(eyre!("Variant is required"));
        }
        let inheritance = match fields.get(1).filter(|label| !label.is_empty()) {
            Some(label) => InheritancePattern::from_str(label)?.label().to_string(),
            None => default_inheritance.to_string(),
        };
        let segregation = validate_segregation(fields.get(2).copied().unwrap_or_default())?;

        Ok(BatchEntry { variant, inheritance, segregation })
    }
}

/// Parse a batch, skipping blank lines and `#` comments.
pub fn parse_batch(text: &str, default_inheritance: &str) -> Result<Vec<BatchEntry>, Report> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|(i, line)| {
            BatchEntry::parse(line, default_inheritance)
                .wrap_err_with(|| format!("Invalid line {} of the batch: {line:?}", i + 1))
        })
        .collect()
}

/// Read a batch file, see [`parse_batch`].
pub fn read_batch(path: &Path, default_inheritance: &str) -> Result<Vec<BatchEntry>, Report> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read file: {path:?}."))?;
    parse_batch(&text, default_inheritance)
}

// ----------------------------------------------------------------------------
// Batch Result
// ----------------------------------------------------------------------------

/// Outcome of one batch entry. A failure keeps its error message.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchResult {
    pub entry: BatchEntry,
    pub outcome: Result<Assessment, String>,
}

impl BatchResult {
    /// Cells of the [`BATCH_COLUMNS`].
    pub fn record(&self) -> Vec<String> {
        let score = |value: f64| round_score(value).to_string();
        let segregation = self.entry.segregation.map(|s| s.to_string()).unwrap_or_else(|| MISSING.to_string());

        match &self.outcome {
            Ok(assessment) => vec![
                assessment.variant.clone(),
                assessment.gene_symbol.clone(),
                assessment.inheritance.clone(),
                segregation,
                score(assessment.components.gene_score),
                score(assessment.components.variant_score),
                score(assessment.components.inheritance_score),
                score(assessment.ncs),
                assessment.priority.to_string(),
                String::new(),
            ],
            Err(error) => {
                let mut record = vec![self.entry.variant.clone(), MISSING.to_string(), self.entry.inheritance.clone(), segregation];
                record.extend(std::iter::repeat(MISSING.to_string()).take(5));
                record.push(error.clone());
                record
            }
        }
    }
}

/// Render batch results as CSV with a header row.
pub fn to_csv(results: &[BatchResult]) -> Result<String, Report> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(BATCH_COLUMNS)?;
    for result in results {
        writer.write_record(result.record())?;
    }
    let bytes = writer.into_inner().map_err(|e| eyre!("Failed to write the batch CSV: {e}"))?;
    String::from_utf8(bytes).wrap_err("Failed to write the batch CSV.")
}
