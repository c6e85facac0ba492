mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

const DEFAULT_LOG_FILTER: &str = "climberrankings_lib=info,climberrankings_cli=info";

#[derive(Parser)]
#[command(name = "climberrankings")]
#[command(about = "Build climb leaderboards from Strava segment efforts")]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, cache, rank and publish every climb
    Build(commands::build::BuildArgs),
    /// Print publish paths for every climb (no network)
    Paths(commands::paths::PathsArgs),
    /// Rank cached efforts for one segment (no network)
    Leaderboard(commands::leaderboard::LeaderboardArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Build(args) => commands::build::run(args, cli.output).await?,
        Commands::Paths(args) => commands::paths::run(args, cli.output)?,
        Commands::Leaderboard(args) => commands::leaderboard::run(args, cli.output)?,
    }

    Ok(())
}
