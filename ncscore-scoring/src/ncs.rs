//! The combined Nephro Candidate Score (NCS) and its interpretation.


use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Weight of the gene score in the NCS.
pub const GENE_WEIGHT: f64 = 4.0;
/// Weight of the variant score in the NCS.
pub const VARIANT_WEIGHT: f64 = 4.0;
/// Weight of the inheritance score in the NCS.
pub const INHERITANCE_WEIGHT: f64 = 2.0;
/// Decimal places used when displaying scores.
pub const STANDARD_ROUNDING: i32 = 2;

// ----------------------------------------------------------------------------
// Score Combiner
// ----------------------------------------------------------------------------

/// Returns the NCS `gene * 4 + variant * 4 + inheritance * 2`.
///
/// Any non-finite input returns 0, so that display code never has to handle a failure.
/// Gene and variant scores are not clamped.
///
/// ## Examples
///
/// ```rust
/// use ncscore_scoring::calculate_ncs;
///
/// let ncs = calculate_ncs(0.6, 0.5, 0.95);
/// assert!((ncs - 6.3).abs() < 1e-9);
/// assert_eq!(calculate_ncs(f64::NAN, 0.5, 0.95), 0.0);
/// ```
pub fn calculate_ncs(gene_score: f64, variant_score: f64, inheritance_score: f64) -> f64 {
    if !(gene_score.is_finite() && variant_score.is_finite() && inheritance_score.is_finite()) {
        warn!("Non-numeric NCS input (gene: {gene_score}, variant: {variant_score}, inheritance: {inheritance_score}), returning 0");
        return 0.0;
    }
    gene_score * GENE_WEIGHT + variant_score * VARIANT_WEIGHT + inheritance_score * INHERITANCE_WEIGHT
}

/// Returns the NCS from raw JSON values, as received from upstream APIs.
///
/// Numbers and numeric strings are accepted, anything else returns 0.
///
/// ```rust
/// use ncscore_scoring::calculate_ncs_from_json;
/// use serde_json::json;
///
/// assert_eq!(calculate_ncs_from_json(&json!(0.5), &json!("0.5"), &json!(1)), 6.0);
/// assert_eq!(calculate_ncs_from_json(&json!(0.5), &json!(null), &json!(1)), 0.0);
/// assert_eq!(calculate_ncs_from_json(&json!(0.5), &json!("high"), &json!(1)), 0.0);
/// ```
pub fn calculate_ncs_from_json(gene_score: &Value, variant_score: &Value, inheritance_score: &Value) -> f64 {
    match (numeric(gene_score), numeric(variant_score), numeric(inheritance_score)) {
        (Some(g), Some(v), Some(i)) => calculate_ncs(g, v, i),
        _ => {
            warn!("Non-numeric NCS input (gene: {gene_score}, variant: {variant_score}, inheritance: {inheritance_score}), returning 0");
            0.0
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Round a score to [`STANDARD_ROUNDING`] decimal places for display.
///
/// ```rust
/// assert_eq!(ncscore_scoring::round_score(6.300000000000001), 6.3);
/// ```
pub fn round_score(score: f64) -> f64 {
    let factor = 10_f64.powi(STANDARD_ROUNDING);
    (score * factor).round() / factor
}

// ----------------------------------------------------------------------------
// Score Components
// ----------------------------------------------------------------------------

/// The three sub-scores of an NCS. The NCS itself is always derived, never stored.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub gene_score: f64,
    pub variant_score: f64,
    pub inheritance_score: f64,
}

impl ScoreComponents {
    pub fn new(gene_score: f64, variant_score: f64, inheritance_score: f64) -> Self {
        ScoreComponents { gene_score, variant_score, inheritance_score }
    }

    /// Returns the combined NCS, see [`calculate_ncs`].
    pub fn ncs(&self) -> f64 {
        calculate_ncs(self.gene_score, self.variant_score, self.inheritance_score)
    }

    /// Returns the [`Priority`] of the combined NCS.
    pub fn priority(&self) -> Priority {
        Priority::from_ncs(self.ncs())
    }
}

impl Display for ScoreComponents {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NCS {} ({}): gene {}, variant {}, inheritance {}",
            round_score(self.ncs()),
            self.priority(),
            round_score(self.gene_score),
            round_score(self.variant_score),
            round_score(self.inheritance_score),
        )
    }
}

// ----------------------------------------------------------------------------
// Priority
// ----------------------------------------------------------------------------

/// Interpretation of an NCS: `[0, 3)` low, `[3, 7)` moderate, `[7, 10]` high.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Priority {
    Low,
    Moderate,
    High,
}

impl Priority {
    /// Returns the [`Priority`] of an NCS. Values outside `[0, 10]` are clamped first.
    ///
    /// ```rust
    /// use ncscore_scoring::Priority;
    ///
    /// assert_eq!(Priority::from_ncs(2.99), Priority::Low);
    /// assert_eq!(Priority::from_ncs(3.0),  Priority::Moderate);
    /// assert_eq!(Priority::from_ncs(7.0),  Priority::High);
    /// assert_eq!(Priority::from_ncs(11.0), Priority::High);
    /// ```
    pub fn from_ncs(ncs: f64) -> Self {
        let ncs = if ncs.is_nan() { 0.0 } else { ncs.clamp(0.0, 10.0) };
        if ncs < 3.0 {
            Priority::Low
        } else if ncs < 7.0 {
            Priority::Moderate
        } else {
            Priority::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low Priority",
            Priority::Moderate => "Moderate Priority",
            Priority::High => "High Priority",
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
