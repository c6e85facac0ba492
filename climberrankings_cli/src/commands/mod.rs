//! CLI subcommand implementations.

pub mod build;
pub mod leaderboard;
pub mod paths;

use anyhow::{bail, Result};
use chrono::{Datelike, Utc};

/// Evaluation year for yearly facets: the given one, or the current UTC year.
pub fn resolve_year(year: Option<i32>) -> Result<i32> {
    let year = year.unwrap_or_else(|| Utc::now().year());
    if !(1970..=9999).contains(&year) {
        bail!("--year must be between 1970 and 9999, got {}", year);
    }
    Ok(year)
}
