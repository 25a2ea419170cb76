//! Inheritance evidence score from an [`InheritancePattern`] and a segregation probability.

#[cfg(test)]
mod tests;

use crate::{FromJson, ToJson};

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use strum::{EnumIter, IntoEnumIterator};

// ----------------------------------------------------------------------------
// Inheritance Pattern
// ----------------------------------------------------------------------------

/// The mode of inheritance observed for a variant.
///
/// Which patterns carry a base score is decided by the [`InheritanceConfig`],
/// not by the enumeration. For example, a configuration may merge the X-linked
/// categories into [`InheritancePattern::XLinked`].
#[derive(
    Clone, Copy, Debug, Deserialize, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum InheritancePattern {
    #[serde(rename = "Denovo")]
    Denovo,
    #[serde(rename = "Homozygous recessive")]
    HomozygousRecessive,
    #[serde(rename = "Compound heterozygous (confirmed)")]
    CompoundHeterozygousConfirmed,
    #[serde(rename = "Compound heterozygous (suspected)")]
    CompoundHeterozygousSuspected,
    #[serde(rename = "X-linked recessive")]
    XLinkedRecessive,
    #[serde(rename = "X-linked dominant")]
    XLinkedDominant,
    #[serde(rename = "X-linked")]
    XLinked,
    #[serde(rename = "Inherited dominant")]
    InheritedDominant,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl InheritancePattern {
    /// Returns the display label, which is also the serialized form.
    ///
    /// ```rust
    /// use ncscore_scoring::InheritancePattern;
    /// assert_eq!(InheritancePattern::HomozygousRecessive.label(), "Homozygous recessive");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            InheritancePattern::Denovo => "Denovo",
            InheritancePattern::HomozygousRecessive => "Homozygous recessive",
            InheritancePattern::CompoundHeterozygousConfirmed => "Compound heterozygous (confirmed)",
            InheritancePattern::CompoundHeterozygousSuspected => "Compound heterozygous (suspected)",
            InheritancePattern::XLinkedRecessive => "X-linked recessive",
            InheritancePattern::XLinkedDominant => "X-linked dominant",
            InheritancePattern::XLinked => "X-linked",
            InheritancePattern::InheritedDominant => "Inherited dominant",
            InheritancePattern::Unknown => "Unknown",
        }
    }
}

impl Display for InheritancePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for InheritancePattern {
    type Err = Report;

    /// Returns an [`InheritancePattern`] converted from its label.
    ///
    /// ```rust
    /// use ncscore_scoring::InheritancePattern;
    /// use std::str::FromStr;
    ///
    /// assert_eq!(InheritancePattern::Denovo, InheritancePattern::from_str("Denovo")?);
    /// assert!(InheritancePattern::from_str("denovo?").is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    fn from_str(label: &str) -> Result<Self, Report> {
        let label = label.trim();
        InheritancePattern::iter().find(|p| p.label() == label).ok_or_else(|| {
            let choices = InheritancePattern::iter().map(|p| p.label()).collect::<Vec<_>>();
            eyre!("Unknown inheritance pattern: {label:?}")
                .suggestion(format!("Please choose from: {}", choices.join(", ")))
        })
    }
}

// ----------------------------------------------------------------------------
// Inheritance Config
// ----------------------------------------------------------------------------

/// Versioned configuration of the inheritance scoring model.
///
/// The [`Default`] is configuration version `0.1.0`. Alternative versions can be
/// loaded from JSON with [`InheritanceConfig::read`] or [`FromJson`], both of which
/// [validate](InheritanceConfig::validate) the values.
///
/// ## Examples
///
/// ```rust
/// use ncscore_scoring::{InheritanceConfig, InheritancePattern};
///
/// let config = InheritanceConfig::default();
/// assert_eq!(config.base_scores[&InheritancePattern::Denovo], 0.95);
/// assert_eq!(config.missing_segregation_penalty, 0.8);
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct InheritanceConfig {
    /// Configuration version (ex. "0.1.0").
    pub version: String,
    /// Prior weight of each pattern before segregation evidence is applied.
    pub base_scores: BTreeMap<InheritancePattern, f64>,
    /// Patterns for which a segregation probability is never applicable.
    pub no_segregation_patterns: Vec<InheritancePattern>,
    /// Patterns that need a second variant (compound heterozygous).
    pub requires_second_variant: Vec<InheritancePattern>,
    /// Segregation probability treated as maximal evidence.
    pub gamma: f64,
    /// Floor applied to the segregation probability before taking a logarithm.
    pub epsilon: f64,
    /// Multiplier applied when segregation is expected but missing.
    pub missing_segregation_penalty: f64,
    /// Base score of patterns without an entry in `base_scores`.
    pub fallback_base_score: f64,
}

impl Default for InheritanceConfig {
    fn default() -> Self {
        use InheritancePattern::*;
        let base_scores = BTreeMap::from([
            (Denovo, 0.95),
            (HomozygousRecessive, 0.8),
            (CompoundHeterozygousConfirmed, 0.8),
            (XLinkedRecessive, 0.7),
            (XLinkedDominant, 0.5),
            (InheritedDominant, 0.4),
            (CompoundHeterozygousSuspected, 0.4),
            (Unknown, 0.1),
        ]);

        InheritanceConfig {
            version: "0.1.0".to_string(),
            base_scores,
            no_segregation_patterns: vec![Denovo, Unknown, CompoundHeterozygousSuspected],
            requires_second_variant: vec![
                CompoundHeterozygousConfirmed,
                CompoundHeterozygousSuspected,
            ],
            gamma: 0.001,
            epsilon: 1e-10,
            missing_segregation_penalty: 0.8,
            fallback_base_score: 0.1,
        }
    }
}

impl FromJson for InheritanceConfig {
    /// Returns a validated [`InheritanceConfig`] parsed from JSON.
    ///
    /// ```rust
    /// use ncscore_scoring::{FromJson, InheritanceConfig, ToJson};
    ///
    /// let json = InheritanceConfig::default().to_json()?;
    /// let config = InheritanceConfig::from_json(&json)?;
    /// assert_eq!(config, InheritanceConfig::default());
    ///
    /// let json = json.replace("0.95", "1.95");
    /// assert!(InheritanceConfig::from_json(&json).is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    fn from_json(json: &str) -> Result<Self, Report> {
        let config: InheritanceConfig =
            serde_json::from_str(json).wrap_err("Failed to deserialize inheritance config.")?;
        config.validate()?;
        Ok(config)
    }
}

impl ToJson for InheritanceConfig {
    fn to_json(&self) -> Result<String, Report> {
        serde_json::to_string_pretty(self)
            .wrap_err_with(|| format!("Failed to serialize inheritance config: {self:?}"))
    }
}

impl InheritanceConfig {
    /// Read a validated [`InheritanceConfig`] from a JSON file.
    pub fn read<P>(path: P) -> Result<Self, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let json = std::fs::read_to_string(&path)
            .wrap_err(eyre!("Failed to read inheritance config: {path:?}"))?;
        InheritanceConfig::from_json(&json).wrap_err(eyre!("Invalid inheritance config: {path:?}"))
    }

    /// Returns an error if any probability-like value is outside its allowed range.
    pub fn validate(&self) -> Result<(), Report> {
        for (pattern, score) in &self.base_scores {
            if !(0.0..=1.0).contains(score) {
                return Err(eyre!("Base score of {pattern} must be between 0 and 1, got {score}"));
            }
        }
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(eyre!("gamma must be between 0 and 1 (exclusive), got {}", self.gamma));
        }
        if !(self.epsilon > 0.0) {
            return Err(eyre!("epsilon must be positive, got {}", self.epsilon));
        }
        if !(0.0..=1.0).contains(&self.missing_segregation_penalty) {
            return Err(eyre!(
                "missing_segregation_penalty must be between 0 and 1, got {}",
                self.missing_segregation_penalty
            ));
        }
        if !(0.0..=1.0).contains(&self.fallback_base_score) {
            return Err(eyre!(
                "fallback_base_score must be between 0 and 1, got {}",
                self.fallback_base_score
            ));
        }
        Ok(())
    }

    /// Returns the base score of a pattern label, or the fallback for unrecognized labels.
    ///
    /// ```rust
    /// use ncscore_scoring::InheritanceConfig;
    /// let config = InheritanceConfig::default();
    /// assert_eq!(config.base_score("Inherited dominant"), 0.4);
    /// assert_eq!(config.base_score("Mitochondrial"), 0.1);
    /// ```
    pub fn base_score(&self, pattern: &str) -> f64 {
        InheritancePattern::from_str(pattern)
            .ok()
            .and_then(|p| self.base_scores.get(&p).copied())
            .unwrap_or(self.fallback_base_score)
    }

    /// Returns true if a segregation probability adds evidence for this pattern.
    ///
    /// Unrecognized labels are treated as expecting segregation.
    pub fn segregation_applicable(&self, pattern: &str) -> bool {
        match InheritancePattern::from_str(pattern) {
            Ok(p) => !self.no_segregation_patterns.contains(&p),
            Err(_) => true,
        }
    }

    /// Returns true if the pattern needs a second (compound heterozygous) variant.
    pub fn requires_second_variant(&self, pattern: &str) -> bool {
        InheritancePattern::from_str(pattern)
            .map(|p| self.requires_second_variant.contains(&p))
            .unwrap_or(false)
    }

    /// Returns the inheritance score in `[0, 1]` for raw, possibly malformed input.
    ///
    /// - Segregation is ignored for patterns where it is not applicable.
    /// - Out-of-range values are clamped to `[0, 1]` with a warning, non-finite values are treated as missing.
    /// - Missing segregation on a pattern that expects it is multiplied by
    ///   [`missing_segregation_penalty`](InheritanceConfig::missing_segregation_penalty).
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use ncscore_scoring::InheritanceConfig;
    /// let config = InheritanceConfig::default();
    ///
    /// assert_eq!(config.calculate_inheritance_score("Denovo", None), 0.95);
    /// assert_eq!(config.calculate_inheritance_score("Homozygous recessive", Some(1.0)), 0.8);
    /// assert_eq!(config.calculate_inheritance_score("Homozygous recessive", None), 0.8 * 0.8);
    ///
    /// let maximal = config.calculate_inheritance_score("Homozygous recessive", Some(0.001));
    /// assert!((maximal - 1.0).abs() < 1e-12);
    /// ```
    pub fn calculate_inheritance_score(&self, pattern: &str, segregation: Option<f64>) -> f64 {
        let base_score = clamp_unit("base score", self.base_score(pattern));
        let applicable = self.segregation_applicable(pattern);

        let segregation = segregation.and_then(|p| {
            if p.is_finite() {
                Some(clamp_unit("segregation probability", p))
            } else {
                warn!("Ignoring non-numeric segregation probability for {pattern:?}: {p}");
                None
            }
        });

        let p_value = match (applicable, segregation) {
            (true, Some(p)) => p,
            _ => 1.0,
        };

        let score = compute_variant_score(base_score, p_value, self.gamma, self.epsilon)
            .unwrap_or_else(|e| {
                warn!("Falling back to base score for {pattern:?}: {e}");
                base_score
            });

        if applicable && segregation.is_none() {
            debug!("Segregation missing for {pattern:?}, applying penalty {}", self.missing_segregation_penalty);
            score * self.missing_segregation_penalty
        } else {
            score
        }
    }
}

/// Returns the inheritance score with the default [`InheritanceConfig`].
///
/// ```rust
/// assert_eq!(ncscore_scoring::calculate_inheritance_score("Denovo", None), 0.95);
/// assert_eq!(ncscore_scoring::calculate_inheritance_score("not a pattern", Some(1.0)), 0.1);
/// ```
pub fn calculate_inheritance_score(pattern: &str, segregation: Option<f64>) -> f64 {
    InheritanceConfig::default().calculate_inheritance_score(pattern, segregation)
}

// ----------------------------------------------------------------------------
// Core Transform
// ----------------------------------------------------------------------------

/// Returns `base_score` boosted towards 1.0 by the evidence of a segregation `p_value`.
///
/// `p_value = 1` returns `base_score` exactly and `p_value <= gamma` returns 1.0,
/// interpolating monotonically by `-ln(p) / -ln(gamma)` in between.
///
/// Inputs outside `[0, 1]` are a caller bug and return an error rather than being clamped.
///
/// ## Examples
///
/// ```rust
/// use ncscore_scoring::compute_variant_score;
///
/// assert_eq!(compute_variant_score(0.4, 1.0, 0.001, 1e-10)?, 0.4);
/// assert!((compute_variant_score(0.4, 0.0, 0.001, 1e-10)? - 1.0).abs() < 1e-12);
/// assert!(compute_variant_score(1.4, 0.5, 0.001, 1e-10).is_err());
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn compute_variant_score(
    base_score: f64,
    p_value: f64,
    gamma: f64,
    epsilon: f64,
) -> Result<f64, Report> {
    if !(0.0..=1.0).contains(&base_score) {
        return Err(eyre!("baseScore must be between 0 and 1, got {base_score}"));
    }
    if !(0.0..=1.0).contains(&p_value) {
        return Err(eyre!("pValue must be between 0 and 1, got {p_value}"));
    }
    if !(gamma > 0.0 && gamma < 1.0) {
        return Err(eyre!("gamma must be between 0 and 1 (exclusive), got {gamma}"));
    }

    let adjusted_p = p_value.max(epsilon);
    let raw_factor = (-adjusted_p.ln() / -gamma.ln()).min(1.0);

    Ok((base_score + (1.0 - base_score) * raw_factor).min(1.0))
}

/// Parse a raw segregation probability.
///
/// Empty input is [`None`] (not supplied). Non-numeric input is also [`None`], with a warning.
///
/// ```rust
/// use ncscore_scoring::parse_segregation;
///
/// assert_eq!(parse_segregation(""), None);
/// assert_eq!(parse_segregation(" 0.05 "), Some(0.05));
/// assert_eq!(parse_segregation("abc"), None);
/// ```
pub fn parse_segregation(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(p) => Some(p),
        Err(_) => {
            warn!("Segregation probability is not a number: {raw:?}");
            None
        }
    }
}

fn clamp_unit(name: &str, value: f64) -> f64 {
    if (0.0..=1.0).contains(&value) {
        value
    } else {
        let clamped = value.clamp(0.0, 1.0);
        warn!("Clamping {name} {value} to {clamped}");
        clamped
    }
}
