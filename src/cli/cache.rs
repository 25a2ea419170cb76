//! Command-line interface (CLI) for response cache [Commands](Command).

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// CLI arguments to inspect or manage the response cache.
#[derive(Debug, Deserialize, Parser, Serialize)]
#[clap(about = "Inspect or manage the response cache.")]
pub struct Args {
    /// Cache command: Stats, Clear, Enable, Disable
    #[clap(subcommand)]
    pub command: Command,
}

/// CLI cache [commands](#variants).
#[derive(Debug, Deserialize, Serialize, Subcommand)]
pub enum Command {
    /// Print the cache counters and the number of cached items.
    /// ## Examples
    /// ```rust
    /// use ncscore::{Cli, cli, cli::Command};
    /// use clap::Parser;
    /// let input   = ["ncscore", "cache", "stats"];
    /// let command = Cli::parse_from(input).command;
    /// match command {
    ///   Command::Cache(args) => assert!(matches!(args.command, cli::cache::Command::Stats)),
    ///   _                    => assert!(false),
    /// }
    /// ```
    #[clap(about = "Show cache statistics.")]
    Stats,

    #[clap(about = "Remove cached responses.")]
    Clear(ClearArgs),

    #[clap(about = "Enable the cache in the persistent settings.")]
    Enable,

    #[clap(about = "Disable the cache in the persistent settings.")]
    Disable,
}

/// Cache clearing arguments.
#[derive(Clone, Debug, Default, Deserialize, Parser, Serialize)]
pub struct ClearArgs {
    /// Only remove responses of this kind (ex. gene-details, variant).
    #[clap(short = 't', long = "type")]
    pub kind: Option<String>,
}
