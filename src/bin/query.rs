use anyhow::Result;
use clap::{Parser, Subcommand};
use pair_indexer::config::database_url_from_env;
use pair_indexer::query::commands::{PairQuery, cmd_pair, cmd_pairs, cmd_stats};
use pair_indexer::query::formatters::OutputFormat;
use pair_indexer::repository::{Database, PairRepository};

#[derive(Parser)]
#[command(name = "query")]
#[command(about = "Query indexed pair and pool creations", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pairs, oldest first
    Pairs {
        /// Either side of the pair
        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        factory: Option<String>,

        #[arg(long)]
        stable: Option<bool>,

        #[arg(long, default_value = "100")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Show a single pair
    Pair { address: String },
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let db = Database::new(&database_url_from_env())?;
    let repo = PairRepository::new(&db.conn);

    match cli.command {
        Commands::Pairs {
            token,
            factory,
            stable,
            limit,
            offset,
        } => {
            let query = PairQuery {
                token,
                factory,
                stable,
                limit,
                offset,
            };
            cmd_pairs(&repo, query, &format)?;
        }
        Commands::Pair { address } => {
            cmd_pair(&repo, &address, &format)?;
        }
        Commands::Stats => {
            cmd_stats(&repo, &format)?;
        }
    }

    Ok(())
}
