//! Variant scores computed from consequence annotations.
//!
//! A [`ScoringConfig`] pairs two JSON documents. The variable assignment maps
//! annotation paths to variable names:
//!
//! ```json
//! {"variables": {"transcript_consequences.*.cadd_phred|max|default:0": "cadd_phred"}}
//! ```
//!
//! A path is a `.`-separated list of fields, where `*` expands every element of
//! a list or every value of an object. Modifiers after `|` choose how several
//! numbers are combined (`max`, `min`, `first`, `sum` or `mean`, `max` if
//! unset) and the value used when the path finds nothing (`default:0`,
//! `default:''` or `default:[]`). Text values are collected into a list.
//!
//! The formula document lists named [formulas](crate::formula) per level,
//! evaluated in order. Each result is a variable of the formulas after it.
//!
//! ```json
//! {"formulas": {"annotation_level": [{"nephro_variant_score": "cadd_phred / 50"}]}}
//! ```
//!
//! Annotation-level results are stored on each annotation. Transcript-level
//! results are stored on each transcript consequence, and their
//! `transcript_consequences.*` paths read the transcript itself.


use crate::annotation::transcript_consequences;
use crate::formula::{Formula, Term};

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Variable assignment of the bundled `nephro_variant_score` model.
pub const BUNDLED_VARIABLE_ASSIGNMENT: &str =
    include_str!("../../config/scoring/nephro_variant_score/variable_assignment.json");
/// Formulas of the bundled `nephro_variant_score` model.
pub const BUNDLED_FORMULA: &str = include_str!("../../config/scoring/nephro_variant_score/formula.json");

const TRANSCRIPTS: &str = "transcript_consequences";

// ----------------------------------------------------------------------------
// Scoring Config
// ----------------------------------------------------------------------------

/// Configuration of the variant score, built from a variable assignment and a
/// formula document. Both must be JSON objects that compile to a [`ScoringModel`].
///
/// ## Examples
///
/// ```rust
/// use ncscore::api::ScoringConfig;
///
/// let config = ScoringConfig::parse(r#"{"variables": {}}"#, r#"{"formulas": []}"#)?;
/// assert!(config.formula.contains_key("formulas"));
/// assert!(ScoringConfig::parse("[]", "{}").is_err());
/// assert!(ScoringConfig::bundled()?.model()?.annotation_level.iter().any(|(name, _)| name == "nephro_variant_score"));
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScoringConfig {
    pub variable_assignment: Map<String, Value>,
    pub formula: Map<String, Value>,
}

impl ScoringConfig {
    pub fn parse(variable_assignment: &str, formula: &str) -> Result<Self, Report> {
        let parse = |json: &str, name: &str| -> Result<Map<String, Value>, Report> {
            match serde_json::from_str::<Value>(json).wrap_err_with(|| format!("Failed to parse {name} config."))? {
                Value::Object(map) => Ok(map),
                other => Err(eyre!("The {name} config must be a JSON object, found: {other}")),
            }
        };
        let config = ScoringConfig {
            variable_assignment: parse(variable_assignment, "variable assignment")?,
            formula: parse(formula, "formula")?,
        };
        config.model()?;
        Ok(config)
    }

    /// Read the variable assignment and formula documents from JSON files.
    pub fn read(variable_assignment: &Path, formula: &Path) -> Result<Self, Report> {
        let variable_assignment = std::fs::read_to_string(variable_assignment)
            .wrap_err_with(|| format!("Failed to read file: {variable_assignment:?}."))?;
        let formula = std::fs::read_to_string(formula).wrap_err_with(|| format!("Failed to read file: {formula:?}."))?;
        ScoringConfig::parse(&variable_assignment, &formula)
    }

    /// The `nephro_variant_score` model shipped with the crate.
    pub fn bundled() -> Result<Self, Report> {
        ScoringConfig::parse(BUNDLED_VARIABLE_ASSIGNMENT, BUNDLED_FORMULA).wrap_err("Failed to load the bundled scoring config.")
    }

    pub fn model(&self) -> Result<ScoringModel, Report> {
        ScoringModel::new(self)
    }
}

// ----------------------------------------------------------------------------
// Assignment
// ----------------------------------------------------------------------------

/// How several numbers found by one path are combined.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Aggregate {
    #[default]
    Max,
    Min,
    First,
    Sum,
    Mean,
}

impl Aggregate {
    fn apply(self, values: &[f64]) -> f64 {
        match self {
            Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::First => values.first().copied().unwrap_or_default(),
            Aggregate::Sum => values.iter().sum(),
            Aggregate::Mean => values.iter().sum::<f64>() / values.len().max(1) as f64,
        }
    }
}

/// One variable of the variable assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub variable: String,
    pub path: Vec<String>,
    pub aggregate: Aggregate,
    pub default: Option<Term>,
}

impl Assignment {
    /// Parse a `path|modifier|...` specification.
    ///
    /// ```rust
    /// use ncscore::api::{Aggregate, Assignment};
    /// use ncscore::formula::Term;
    ///
    /// let assignment = Assignment::parse("transcript_consequences.*.cadd_phred|min|default:0", "cadd")?;
    /// assert_eq!(assignment.path, ["transcript_consequences", "*", "cadd_phred"]);
    /// assert_eq!(assignment.aggregate, Aggregate::Min);
    /// assert_eq!(assignment.default, Some(Term::Number(0.0)));
    /// assert!(Assignment::parse("cadd_phred|median", "cadd").is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn parse(spec: &str, variable: &str) -> Result<Self, Report> {
        let mut parts = spec.split('|').map(str::trim);
        let path: Vec<String> = parts.next().unwrap_or_default().split('.').map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return Err(eyre!("Invalid path {spec:?} of variable {variable}"));
        }

        let mut assignment = Assignment { variable: variable.to_string(), path, aggregate: Aggregate::Max, default: None };
        for modifier in parts {
            assignment.aggregate = match modifier {
                "max" => Aggregate::Max,
                "min" => Aggregate::Min,
                "first" => Aggregate::First,
                "sum" => Aggregate::Sum,
                "mean" => Aggregate::Mean,
                _ => match modifier.strip_prefix("default:") {
                    Some(default) => {
                        assignment.default = Some(default_term(default.trim()));
                        continue;
                    }
                    None => return Err(eyre!("Unknown modifier {modifier:?} of variable {variable}")),
                },
            };
        }
        Ok(assignment)
    }

    /// Returns the value at `path` of `data`, or the default when nothing is found.
    fn resolve(&self, data: &Value, path: &[String]) -> Option<Term> {
        let (mut numbers, mut texts) = (Vec::new(), Vec::new());
        collect(data, path, &mut numbers, &mut texts);
        if !numbers.is_empty() {
            return Some(Term::Number(self.aggregate.apply(&numbers)));
        }
        if !texts.is_empty() {
            return Some(Term::List(texts));
        }
        self.default.clone()
    }
}

fn default_term(default: &str) -> Term {
    match default {
        "[]" => Term::List(Vec::new()),
        _ => match default.parse::<f64>() {
            Ok(number) => Term::Number(number),
            Err(_) => Term::Text(default.trim_matches(|c| c == '\'' || c == '"').to_string()),
        },
    }
}

fn collect(value: &Value, path: &[String], numbers: &mut Vec<f64>, texts: &mut Vec<String>) {
    match path.split_first() {
        Some((field, rest)) if field == "*" => match value {
            Value::Array(items) => items.iter().for_each(|item| collect(item, rest, numbers, texts)),
            Value::Object(fields) => fields.values().for_each(|item| collect(item, rest, numbers, texts)),
            _ => {}
        },
        Some((field, rest)) => {
            if let Some(child) = value.get(field) {
                collect(child, rest, numbers, texts);
            }
        }
        None => match value {
            Value::Number(n) => numbers.extend(n.as_f64()),
            Value::Bool(b) => numbers.push(if *b { 1.0 } else { 0.0 }),
            Value::String(text) => texts.push(text.clone()),
            Value::Array(items) => items.iter().for_each(|item| collect(item, &[], numbers, texts)),
            Value::Null | Value::Object(_) => {}
        },
    }
}

// ----------------------------------------------------------------------------
// Scoring Model
// ----------------------------------------------------------------------------

/// A compiled [`ScoringConfig`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoringModel {
    pub assignments: Vec<Assignment>,
    pub annotation_level: Vec<(String, Formula)>,
    pub transcript_level: Vec<(String, Formula)>,
}

fn parse_level(level: &str, formulas: &Value) -> Result<Vec<(String, Formula)>, Report> {
    let Value::Array(entries) = formulas else {
        return Err(eyre!("The {level} formulas must be a list, found: {formulas}"));
    };
    let mut parsed = Vec::new();
    for entry in entries {
        let Value::Object(named) = entry else {
            return Err(eyre!("A {level} formula must be an object of name to formula, found: {entry}"));
        };
        for (name, source) in named {
            let source = source.as_str().ok_or_else(|| eyre!("Formula {name} must be text, found: {source}"))?;
            let formula = source.parse::<Formula>().wrap_err_with(|| format!("Invalid formula {name}"))?;
            parsed.push((name.clone(), formula));
        }
    }
    Ok(parsed)
}

impl ScoringModel {
    pub fn new(config: &ScoringConfig) -> Result<Self, Report> {
        let variables = match config.variable_assignment.get("variables") {
            Some(Value::Object(variables)) => variables,
            Some(other) => return Err(eyre!("The variables must be an object of path to name, found: {other}")),
            None => &config.variable_assignment,
        };
        let assignments = variables
            .iter()
            .map(|(spec, name)| {
                let name = name.as_str().ok_or_else(|| eyre!("The name of variable {spec:?} must be text, found: {name}"))?;
                Assignment::parse(spec, name)
            })
            .collect::<Result<Vec<_>, Report>>()?;

        let mut model = ScoringModel { assignments, ..Default::default() };
        match config.formula.get("formulas") {
            Some(formulas @ Value::Array(_)) => model.annotation_level = parse_level("annotation level", formulas)?,
            Some(Value::Object(levels)) => {
                for (level, formulas) in levels {
                    match level.as_str() {
                        "annotation_level" | "annotationLevel" => {
                            model.annotation_level = parse_level("annotation level", formulas)?
                        }
                        "transcript_level" | "transcriptLevel" => {
                            model.transcript_level = parse_level("transcript level", formulas)?
                        }
                        _ => return Err(eyre!("Unknown formula level: {level}")),
                    }
                }
            }
            Some(other) => return Err(eyre!("The formulas must be a list or an object of levels, found: {other}")),
            None => return Err(eyre!("The formula config has no formulas.")),
        }
        Ok(model)
    }

    /// Resolve every variable against an annotation, or one of its transcript consequences.
    fn variables(&self, annotation: &Value, transcript: Option<&Value>) -> Result<BTreeMap<String, Term>, Report> {
        self.assignments
            .iter()
            .map(|assignment| {
                let term = match (transcript, assignment.path.as_slice()) {
                    (Some(transcript), [field, wildcard, rest @ ..]) if field == TRANSCRIPTS && wildcard == "*" => {
                        assignment.resolve(transcript, rest)
                    }
                    _ => assignment.resolve(annotation, &assignment.path),
                };
                let term = term.ok_or_else(|| eyre!("No value found for variable {}", assignment.variable))?;
                Ok((assignment.variable.clone(), term))
            })
            .collect()
    }

    /// Score one annotation in place.
    pub fn score(&self, annotation: &mut Value) -> Result<(), Report> {
        if !self.transcript_level.is_empty() {
            let scores = transcript_consequences(annotation)
                .iter()
                .map(|transcript| evaluate_level(&self.transcript_level, self.variables(annotation, Some(transcript))?))
                .collect::<Result<Vec<_>, Report>>()?;
            if let Some(Value::Array(transcripts)) = annotation.get_mut(TRANSCRIPTS) {
                transcripts.iter_mut().zip(scores).for_each(|(transcript, scores)| store(transcript, scores));
            }
        }
        if !self.annotation_level.is_empty() {
            let scores = evaluate_level(&self.annotation_level, self.variables(annotation, None)?)?;
            store(annotation, scores);
        }
        Ok(())
    }

    /// Score every annotation. Annotations that cannot be scored are left unchanged.
    pub fn apply(&self, annotations: &mut [Value]) {
        for annotation in annotations.iter_mut() {
            match self.score(annotation) {
                Ok(()) => debug!("Scored annotation: {}", annotation.get("id").unwrap_or(&Value::Null)),
                Err(e) => warn!("Failed to score annotation {}: {e}", annotation.get("id").unwrap_or(&Value::Null)),
            }
        }
    }
}

fn evaluate_level(formulas: &[(String, Formula)], mut variables: BTreeMap<String, Term>) -> Result<Vec<(String, f64)>, Report> {
    formulas
        .iter()
        .map(|(name, formula)| {
            let value = formula.evaluate(&variables).wrap_err_with(|| format!("Failed to compute {name}"))?;
            variables.insert(name.clone(), Term::Number(value));
            Ok((name.clone(), value))
        })
        .collect()
}

fn store(target: &mut Value, scores: Vec<(String, f64)>) {
    if let Value::Object(fields) = target {
        for (name, value) in scores {
            fields.insert(name, json!(value));
        }
    }
}
