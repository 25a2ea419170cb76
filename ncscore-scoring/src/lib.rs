#![doc = include_str!("../README.md")]

use color_eyre::eyre::{Report, Result};

pub mod inheritance;
pub mod ncs;

#[doc(inline)]
pub use inheritance::{calculate_inheritance_score, compute_variant_score, parse_segregation, InheritanceConfig, InheritancePattern};
#[doc(inline)]
pub use ncs::{calculate_ncs, calculate_ncs_from_json, round_score, Priority, ScoreComponents};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Returns an object created from a JSON [`str`].
pub trait FromJson {
    fn from_json(json: &str) -> Result<Self, Report>
    where
        Self: Sized;
}

/// Returns a pretty JSON [`String`] created from an object.
pub trait ToJson {
    fn to_json(&self) -> Result<String, Report>;
}
