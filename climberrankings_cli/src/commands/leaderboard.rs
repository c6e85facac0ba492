//! The `leaderboard` subcommand: rank cached efforts offline.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use climberrankings_lib::{cached_leaderboard, Db, Facet, Gender, TimeWindow};

use crate::output::{print_leaderboard, OutputFormat};

#[derive(Args)]
pub struct LeaderboardArgs {
    /// SQLite cache path
    #[arg(long, default_value = "climberrankings.db")]
    pub db: PathBuf,

    /// Segment ID
    #[arg(long)]
    pub segment: i64,

    /// Gender: male/m or female/f
    #[arg(long)]
    pub gender: Gender,

    /// Restrict to efforts started in this year (all time when omitted)
    #[arg(long)]
    pub year: Option<i32>,

    /// Maximum entries to print
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn run(args: &LeaderboardArgs, format: OutputFormat) -> Result<()> {
    if !args.db.exists() {
        bail!(
            "cache {} does not exist; run `climberrankings build` first",
            args.db.display()
        );
    }
    let window = match args.year {
        Some(year) => TimeWindow::Year(super::resolve_year(Some(year))?),
        None => TimeWindow::Overall,
    };

    let db = Db::open(&args.db)?;
    db.init()?;

    let facet = Facet::new(args.gender, window);
    let view = cached_leaderboard(&db, args.segment, facet, args.limit)?;
    if view.entries.is_empty() {
        eprintln!(
            "No cached {} efforts for segment {}",
            facet, args.segment
        );
    }
    print_leaderboard(&view, format)
}
