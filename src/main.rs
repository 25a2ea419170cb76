#[cfg(feature = "cli")]
use clap::Parser;
use color_eyre::eyre::{Report, Result};
#[cfg(feature = "cli")]
use ncscore::{cli::inheritance, cli::Command, run, Cli};

#[tokio::main]
async fn main() -> Result<(), Report> {
    #[cfg(feature = "cli")]
    {
        // ------------------------------------------------------------------------
        // CLI Setup

        // Parse CLI parameters
        let args = Cli::parse();

        // initialize color_eyre crate for colorized logs
        color_eyre::install()?;

        // Set logging/verbosity level via RUST_LOG
        std::env::set_var("RUST_LOG", args.global.verbosity.to_string());

        // initialize env_logger crate for logging/verbosity level
        env_logger::init();

        let global = args.global;

        // check which CLI command we're running (variant, gene, score, cache, inheritance)
        match args.command {
            // Annotate variants
            Command::Variant(args) => println!("{}", run::variant(&mut run::client(&global)?, &args).await?),
            // Gene details
            Command::Gene(args) => println!("{}", run::gene(&mut run::client(&global)?, &args).await?),
            // Nephro Candidate Score
            Command::Score(args) if args.batch.is_some() => {
                println!("{}", run::score_batch(&mut run::client(&global)?, &args).await?)
            }
            Command::Score(args) => {
                let components = run::score(&mut run::client(&global)?, &args).await?;
                println!("{}", run::score_table(&components));
            }
            // Response cache
            Command::Cache(args) => println!("{}", run::cache(&global, &args)?),
            // Inheritance configuration
            Command::Inheritance(args) => match args.command {
                inheritance::Command::List => {
                    println!("{}", run::inheritance_table(&run::inheritance_config(&global)?))
                }
            },
        }
    }

    Ok(())
}
