#![doc = include_str!("../README.md")]

pub mod annotation;
pub mod api;
pub mod batch;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod error;
pub mod formula;
pub mod retry;
#[cfg(feature = "cli")]
pub mod run;
pub mod variant;

#[doc(inline)]
#[cfg(feature = "cli")]
pub use crate::cli::Cli;
#[doc(inline)]
pub use crate::client::NcsClient;
#[doc(inline)]
pub use crate::error::{ApiError, NetworkCode};
#[doc(inline)]
pub use ncscore_scoring::{
    calculate_inheritance_score, calculate_ncs, InheritanceConfig, InheritancePattern, Priority, ScoreComponents,
};
