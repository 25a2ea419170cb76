//! [Command-line interface](Cli) (CLI) of the main binary.

pub mod cache;
pub mod inheritance;

use crate::api::{Assembly, OutputFormat};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

// ----------------------------------------------------------------------------
// CLI Entry Point
// ----------------------------------------------------------------------------

/// The command-line interface (CLI).
/// ---
/// The CLI is intended for parsing user input from the command-line in the main function. This is achieved with the `parse` function, which parses the command line arguments from [`std::env::args`](https://doc.rust-lang.org/std/env/fn.args.html).
/// ```no_run
/// use clap::Parser;
/// let args = ncscore::Cli::parse();
/// ```
/// Here is a manual example of setting the command-line input:
/// ```rust
/// use clap::Parser;
/// use ncscore::cli::Command;
///
/// let input = ["ncscore", "score", "--gene-score", "0.6", "--variant-score", "0.5", "--inheritance", "Denovo"];
/// let args = ncscore::Cli::parse_from(input);
/// assert!(matches!(args.command, Command::Score(_)));
/// serde_json::to_string_pretty(&args)?;
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Debug, Deserialize, Parser, Serialize)]
#[clap(name = "ncscore", author, version)]
#[clap(about = "ncscore computes the Nephro Candidate Score (NCS) of genetic variants.")]
pub struct Cli {
    #[clap(subcommand)]
    /// Pass CLI arguments to a particular [Command].
    #[clap(help = "Set the command.")]
    pub command: Command,

    /// Options shared by all commands.
    #[clap(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by all commands.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct GlobalArgs {
    /// Set the output [Verbosity] level.
    #[clap(short = 'v', long)]
    #[clap(value_enum, default_value_t = Verbosity::default())]
    #[clap(hide_possible_values = false)]
    #[clap(global = true)]
    #[clap(help = "Set the output verbosity level.")]
    pub verbosity: Verbosity,

    /// Directory of the persistent settings and session cache.
    #[clap(long, default_value = ".ncscore", global = true)]
    pub state_dir: PathBuf,

    /// Bypass the response cache for this invocation.
    #[clap(long, global = true)]
    pub no_cache: bool,

    /// Base URL of the gene JSON files.
    #[clap(long, env = "NCSCORE_GENE_API_URL", global = true)]
    pub gene_api_url: Option<String>,

    /// JSON file with the individual gene API URLs, takes precedence over --gene-api-url.
    #[clap(long, global = true)]
    pub gene_api_config: Option<PathBuf>,

    /// JSON file replacing the built-in inheritance scoring configuration.
    #[clap(long, global = true)]
    pub inheritance_config: Option<PathBuf>,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        GlobalArgs {
            verbosity: Verbosity::default(),
            state_dir: PathBuf::from(".ncscore"),
            no_cache: false,
            gene_api_url: None,
            gene_api_config: None,
            inheritance_config: None,
        }
    }
}

/// CLI [commands](#variants). Used to decide which runtime [Command](#variants) the CLI arguments should be passed to.
#[derive(Debug, Deserialize, Serialize, Subcommand)]
pub enum Command {
    /// Pass CLI arguments to the [variant](crate::run::variant) command.
    /// ## Examples
    /// ```rust
    /// use ncscore::{Cli, cli::Command};
    /// use clap::Parser;
    /// let input = ["ncscore", "variant", "1-55051215-G-GA", "--output", "tsv"];
    /// let args = Cli::parse_from(input);
    /// assert!(matches!(args.command, Command::Variant(_)));
    /// ```
    #[clap(about = "Annotate one or more variants.")]
    #[clap(arg_required_else_help = true)]
    Variant(VariantArgs),

    #[clap(about = "Look up the details of a gene.")]
    #[clap(arg_required_else_help = true)]
    Gene(GeneArgs),

    #[clap(about = "Compute the NCS of a variant.")]
    #[clap(arg_required_else_help = true)]
    Score(ScoreArgs),

    #[clap(about = "Inspect or manage the response cache.")]
    Cache(cache::Args),

    #[clap(about = "Inspect the inheritance scoring configuration.")]
    Inheritance(inheritance::Args),
}

// ----------------------------------------------------------------------------
// Command Arguments
// ----------------------------------------------------------------------------

/// Variant annotation arguments.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct VariantArgs {
    /// Variants in VCF (1-55051215-G-GA) or HGVS (NM_001009944.3:c.11935C>T) notation.
    ///
    /// Several variants are sent as one batch request.
    #[clap(required = true)]
    pub input: Vec<String>,

    /// Genome assembly.
    #[clap(short = 'a', long, value_enum, default_value_t = Assembly::default())]
    pub assembly: Assembly,

    /// Output format.
    #[clap(short = 'o', long, value_enum, default_value_t = OutputFormat::default())]
    pub output: OutputFormat,

    /// Comma-separated field=value conditions on transcript consequences.
    #[clap(short = 'f', long, default_value = "")]
    pub filter: String,

    /// Variable assignment of the variant scoring configuration (JSON).
    #[clap(long, requires = "formula")]
    pub variable_assignment: Option<PathBuf>,

    /// Formula of the variant scoring configuration (JSON).
    #[clap(long, requires = "variable_assignment")]
    pub formula: Option<PathBuf>,
}

/// Gene lookup arguments.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct GeneArgs {
    /// Gene symbol (ex. NPHS1).
    pub symbol: String,

    /// Print the full gene details as JSON.
    #[clap(long)]
    pub json: bool,
}

/// Scoring arguments.
///
/// Sub-scores are either given directly, or fetched for a `--variant` or each variant of a `--batch`.
#[derive(Clone, Debug, Default, Deserialize, Parser, Serialize)]
pub struct ScoreArgs {
    /// Inheritance pattern (ex. Denovo, "Homozygous recessive").
    ///
    /// With --batch, the pattern of lines that have none.
    #[clap(short = 'i', long, required = true)]
    pub inheritance: String,

    /// Segregation probability between 0 and 1.
    #[clap(short = 's', long)]
    pub segregation: Option<String>,

    /// Gene score between 0 and 1.
    #[clap(long)]
    pub gene_score: Option<f64>,

    /// Fetch the gene score of this gene symbol.
    #[clap(long, conflicts_with = "gene_score")]
    pub gene: Option<String>,

    /// Variant score between 0 and 1.
    #[clap(long)]
    pub variant_score: Option<f64>,

    /// Fetch the sub-scores of this variant.
    #[clap(long, conflicts_with_all = ["gene_score", "variant_score", "gene"])]
    pub variant: Option<String>,

    /// Score every variant of this file, one `variant[<TAB>inheritance[<TAB>segregation]]` per line.
    #[clap(long, conflicts_with_all = ["gene_score", "variant_score", "gene", "variant", "segregation"])]
    pub batch: Option<PathBuf>,

    /// Genome assembly used with --variant and --batch.
    #[clap(short = 'a', long, value_enum, default_value_t = Assembly::default())]
    pub assembly: Assembly,
}

// -----------------------------------------------------------------------------
// Verbosity
// -----------------------------------------------------------------------------

/// The output verbosity level.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ValueEnum)]
pub enum Verbosity {
    #[default]
    Info,
    Warn,
    Debug,
    Error,
}

impl Display for Verbosity {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        // Convert to lowercase for RUST_LOG env var compatibility
        let lowercase = format!("{:?}", self).to_lowercase();
        write!(f, "{lowercase}")
    }
}
