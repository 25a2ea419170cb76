//! Command-line interface (CLI) for inheritance [Commands](Command).

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// CLI arguments to inspect the inheritance scoring configuration.
#[derive(Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Deserialize, Serialize, Subcommand)]
pub enum Command {
    /// Print the base score and segregation rules of every inheritance pattern.
    #[clap(about = "List inheritance patterns.")]
    List,
}
