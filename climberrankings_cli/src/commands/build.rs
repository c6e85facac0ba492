//! The `build` subcommand: fetch, cache, rank and publish every climb.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::Args;
use climberrankings_lib::{
    load_climbs, run_climbs, Db, JsonSiteRenderer, RunConfig, StravaProvider, MAX_CONCURRENCY,
    PAGE_CAP,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::{print_run_summary, OutputFormat};

#[derive(Args)]
pub struct BuildArgs {
    /// Strava access token (falls back to STRAVA_ACCESS_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Climbs file (.json, .yaml, .yml or .toml)
    #[arg(long)]
    pub climbs: PathBuf,

    /// SQLite cache path
    #[arg(long, default_value = "climberrankings.db")]
    pub db: PathBuf,

    /// Output directory for published pages
    #[arg(long, default_value = "site")]
    pub out: PathBuf,

    /// Year for the yearly leaderboards (defaults to the current UTC year)
    #[arg(long)]
    pub year: Option<i32>,

    /// Climbs processed at once
    #[arg(long, default_value = "4")]
    pub concurrency: usize,

    /// Refetch segment details even when cached
    #[arg(long)]
    pub refresh_segments: bool,
}

fn resolve_token(flag: Option<&str>) -> Result<String> {
    let token = flag
        .map(str::to_string)
        .or_else(|| std::env::var("STRAVA_ACCESS_TOKEN").ok())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    match token {
        Some(token) => Ok(token),
        None => bail!(
            "no access token: pass --token <TOKEN> or set STRAVA_ACCESS_TOKEN (a .env file works too)"
        ),
    }
}

fn check_concurrency(concurrency: usize) -> Result<()> {
    if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
        bail!("--concurrency must be between 1 and {}", MAX_CONCURRENCY);
    }
    Ok(())
}

pub async fn run(args: &BuildArgs, format: OutputFormat) -> Result<()> {
    let token = resolve_token(args.token.as_deref())?;
    let year = super::resolve_year(args.year)?;
    check_concurrency(args.concurrency)?;

    let climbs = load_climbs(&args.climbs)
        .with_context(|| format!("usage: build --climbs <FILE>; could not load {}", args.climbs.display()))?;

    let db = Db::open(&args.db)?;
    db.init()?;
    let db = Arc::new(Mutex::new(db));

    let provider = Arc::new(StravaProvider::new(&token)?);
    let renderer = Arc::new(JsonSiteRenderer::new(&args.out));
    let config = RunConfig {
        as_of_year: year,
        concurrency: args.concurrency,
        refresh_segments: args.refresh_segments,
        page_size: PAGE_CAP,
    };

    eprintln!(
        "Building {} climbs for {} into {} (cache {})",
        climbs.len(),
        year,
        args.out.display(),
        args.db.display()
    );

    let pb = ProgressBar::new(climbs.len() as u64);
    pb.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}",
    )?);
    pb.set_message("building leaderboards...");

    let mut ok = 0usize;
    let mut failed = 0usize;
    let summary = run_climbs(
        &climbs,
        Arc::clone(&provider),
        db,
        renderer,
        &config,
        |outcome| {
            match &outcome.result {
                Ok(_) => ok += 1,
                Err(err) => {
                    failed += 1;
                    pb.println(format!("  Warning: '{}' failed: {}", outcome.climb, err));
                }
            }
            pb.set_message(format!("{} ok, {} err", ok, failed));
            pb.inc(1);
        },
    )
    .await?;
    pb.finish_with_message(format!("{} published, {} failed", ok, failed));

    print_run_summary(&summary, format)?;

    let requests = provider.request_summary();
    eprintln!(
        "Requests: {} made, {} rate limited, {} retried ({:.1}s backoff)",
        requests.requests_made,
        requests.requests_rate_limited,
        requests.requests_retried,
        requests.total_backoff_secs
    );
    eprintln!(
        "Cache: {} athletes, {} segments, {} efforts",
        summary.cache.athletes, summary.cache.segments, summary.cache.efforts
    );

    if let Some(reason) = &summary.aborted {
        bail!("run aborted: {}", reason);
    }
    if !summary.is_success() {
        bail!(
            "{} of {} climbs did not publish",
            summary.total - summary.published.len(),
            summary.total
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_bounds() {
        assert!(check_concurrency(0).is_err());
        assert!(check_concurrency(1).is_ok());
        assert!(check_concurrency(MAX_CONCURRENCY).is_ok());
        assert!(check_concurrency(MAX_CONCURRENCY + 1).is_err());
    }

    #[test]
    fn flag_token_wins() {
        assert_eq!(resolve_token(Some(" abc ")).unwrap(), "abc");
    }

    #[test]
    fn blank_flag_token_rejected_without_env() {
        if std::env::var("STRAVA_ACCESS_TOKEN").is_err() {
            assert!(resolve_token(Some("   ")).is_err());
            assert!(resolve_token(None).is_err());
        }
    }
}
