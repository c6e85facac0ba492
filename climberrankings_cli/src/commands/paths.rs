//! The `paths` subcommand: print publish paths without touching the network.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use climberrankings_lib::{load_climbs, PathRegistry};

use crate::output::{print_paths, OutputFormat};

#[derive(Args)]
pub struct PathsArgs {
    /// Climbs file (.json, .yaml, .yml or .toml)
    #[arg(long)]
    pub climbs: PathBuf,

    /// Year for the yearly leaderboards (defaults to the current UTC year)
    #[arg(long)]
    pub year: Option<i32>,
}

pub fn run(args: &PathsArgs, format: OutputFormat) -> Result<()> {
    let year = super::resolve_year(args.year)?;
    let climbs = load_climbs(&args.climbs)
        .with_context(|| format!("could not load {}", args.climbs.display()))?;
    let resolved = PathRegistry::resolve_all(&climbs, year)?;
    print_paths(&resolved, format)
}
