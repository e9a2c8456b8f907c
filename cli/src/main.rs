mod check;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vegancheck")]
#[command(about = "Check ingredient lists for animal-derived ingredients", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an ingredient list and print the result as JSON
    Check {
        /// Ingredient text (reads stdin when neither TEXT nor --file is given)
        text: Option<String>,
        /// Read the ingredient text from a file
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Knowledge base JSON file (default: bundled knowledge base)
        #[arg(long)]
        knowledge_base: Option<PathBuf>,
        /// Directory for remembered results (default: ~/.vegancheck/memory)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Don't read or write remembered results on disk
        #[arg(long, conflicts_with = "cache_dir")]
        no_cache: bool,
        /// Never call the oracle, even if OPENROUTER_API_KEY is set
        #[arg(long)]
        offline: bool,
    },
    /// Print the normalized tokens for an ingredient list
    Normalize {
        /// Ingredient text
        text: String,
    },
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Check {
            text,
            file,
            knowledge_base,
            cache_dir,
            no_cache,
            offline,
        } => {
            let options = check::CheckOptions {
                knowledge_base,
                cache_dir,
                no_cache,
                offline,
            };
            let input = check::read_input(text, file.as_deref())?;
            check::run(&input, &options).await?;
        }
        Commands::Normalize { text } => {
            let tokens = vegancheck_core::normalize(&text);
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
    }

    Ok(())
}
