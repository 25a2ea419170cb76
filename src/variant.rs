//! Normalize and validate variant and segregation input.
//!
//! Two variant notations are accepted:
//!
//! - VCF-like: `chrom-pos-ref-alt`, with `-`, `:` or whitespace as delimiter and an optional `chr` prefix.
//! - HGVS: transcript notation, ex. `NM_001009944.3:c.11935C>T` or `ENST00000262304.9:c.11935C>T`.

#[cfg(test)]
mod tests;

use color_eyre::eyre::{eyre, Report, Result};
use color_eyre::Help;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

/// Usage hint shown for invalid variants.
pub const VARIANT_USAGE: &str = "Please enter a valid variant in VCF format (e.g., 1-55051215-G-GA, chr1:55051215:G:GA) or HGVS format (e.g., NM_001009944.3:c.11935C>T)";

static VCF_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(chr)?(\d+|[XYM])([-:\s])(\d+)([-:\s])([ACGT]+)([-:\s])([ACGT]+)$").ok());
static HGVS_PREFIX_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Z]+_\d+(\.\d+)?|ENST\d+(\.\d+)?)(:|\.)([cgnmpr])\.").ok());
static HGVS_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Z]+_\d+(\.\d+)?|ENST\d+(\.\d+)?)(:|\.)(c|g|p|m|n|r)\.[^:]+$").ok());

// ----------------------------------------------------------------------------
// VCF Variant
// ----------------------------------------------------------------------------

/// A variant in VCF coordinates.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VcfVariant {
    /// Chromosome without `chr` prefix.
    pub chrom: String,
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
}

impl VcfVariant {
    /// Parse a VCF-like variant. All three delimiters must be the same character.
    ///
    /// ```rust
    /// use ncscore::variant::VcfVariant;
    ///
    /// let variant = VcfVariant::parse("chr1:55051215:G:GA").unwrap();
    /// assert_eq!(variant.to_string(), "1-55051215-G-GA");
    /// assert!(VcfVariant::parse("1-55051215:G-GA").is_none());
    /// ```
    pub fn parse(input: &str) -> Option<VcfVariant> {
        let captures = VCF_REGEX.as_ref()?.captures(input)?;
        let delimiters = [&captures[3], &captures[5], &captures[7]];
        if delimiters.iter().any(|d| *d != delimiters[0]) {
            return None;
        }
        Some(VcfVariant {
            chrom: captures[2].to_uppercase(),
            pos: captures[4].parse().ok()?,
            reference: captures[6].to_uppercase(),
            alternate: captures[8].to_uppercase(),
        })
    }

    /// The variant as a VEP region line: `chrom pos . ref alt . . .`
    pub fn to_region(&self) -> String {
        format!("{} {} . {} {} . . .", self.chrom, self.pos, self.reference, self.alternate)
    }
}

impl Display for VcfVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}-{}", self.chrom, self.pos, self.reference, self.alternate)
    }
}

/// Returns true if the input looks like HGVS transcript notation.
pub fn is_hgvs(input: &str) -> bool {
    HGVS_REGEX.as_ref().is_some_and(|regex| regex.is_match(input))
}

// ----------------------------------------------------------------------------
// Normalize
// ----------------------------------------------------------------------------

/// Normalize a variant for submission.
///
/// VCF-like inputs become `chrom-pos-ref-alt`, HGVS inputs lose all whitespace,
/// anything else is only trimmed.
///
/// ```rust
/// use ncscore::variant::normalize_variant;
///
/// assert_eq!(normalize_variant("  chr1 55051215 G GA "), "1-55051215-G-GA");
/// assert_eq!(normalize_variant("NM_001009944.3:c.11935 C>T"), "NM_001009944.3:c.11935C>T");
/// assert_eq!(normalize_variant(" rs1234 "), "rs1234");
/// ```
pub fn normalize_variant(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    if let Some(variant) = VcfVariant::parse(trimmed) {
        return variant.to_string();
    }
    if HGVS_PREFIX_REGEX.as_ref().is_some_and(|regex| regex.is_match(trimmed)) {
        return trimmed.split_whitespace().collect();
    }
    trimmed.to_string()
}

// ----------------------------------------------------------------------------
// Validate
// ----------------------------------------------------------------------------

/// Validate a variant in VCF-like or HGVS notation.
///
/// ```rust
/// use ncscore::variant::validate_variant;
///
/// assert!(validate_variant("1-55051215-G-GA").is_ok());
/// assert!(validate_variant("ENST00000262304.9:c.11935C>T").is_ok());
/// assert!(validate_variant("").is_err());
/// assert!(validate_variant("NPHS1").is_err());
/// ```
pub fn validate_variant(input: &str) -> Result<(), Report> {
    let input = input.trim();
    if input.is_empty() {
        return Err(eyre!("Variant is required")).suggestion(VARIANT_USAGE);
    }
    if VcfVariant::parse(input).is_some() || is_hgvs(input) {
        return Ok(());
    }
    Err(eyre!("Invalid variant: {input:?}")).suggestion(VARIANT_USAGE)
}

/// Validate a segregation probability. Empty input is accepted and returns `None`.
///
/// ```rust
/// use ncscore::variant::validate_segregation;
///
/// assert_eq!(validate_segregation("")?, None);
/// assert_eq!(validate_segregation("0.05")?, Some(0.05));
/// assert!(validate_segregation("1.5").is_err());
/// assert!(validate_segregation("high").is_err());
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn validate_segregation(input: &str) -> Result<Option<f64>, Report> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let value = match input.parse::<f64>() {
        Ok(value) if !value.is_nan() => value,
        _ => return Err(eyre!("Segregation must be a number")).suggestion(format!("Received: {input:?}")),
    };
    if !(0.0..=1.0).contains(&value) {
        return Err(eyre!("Segregation must be between 0 and 1")).suggestion(format!("Received: {value}"));
    }
    Ok(Some(value))
}
