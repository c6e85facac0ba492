use std::io::Write;

use anyhow::Result;
use climberrankings_lib::{ClimbPaths, LeaderboardView, RunSummary};
use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Tabled, Serialize)]
struct LeaderboardRow {
    #[tabled(rename = "Rank")]
    #[serde(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Athlete")]
    #[serde(rename = "Athlete")]
    athlete: String,
    #[tabled(rename = "Time")]
    #[serde(rename = "Time")]
    time: String,
    #[tabled(rename = "Date")]
    #[serde(rename = "Date")]
    date: String,
    #[tabled(rename = "Effort")]
    #[serde(rename = "Effort")]
    effort_url: String,
}

#[derive(Tabled, Serialize)]
struct PathRow {
    #[tabled(rename = "Climb")]
    #[serde(rename = "Climb")]
    climb: String,
    #[tabled(rename = "Facet")]
    #[serde(rename = "Facet")]
    facet: String,
    #[tabled(rename = "Source")]
    #[serde(rename = "Source")]
    source: String,
    #[tabled(rename = "Target")]
    #[serde(rename = "Target")]
    target: String,
}

#[derive(Tabled, Serialize)]
struct OutcomeRow {
    #[tabled(rename = "Climb")]
    #[serde(rename = "Climb")]
    climb: String,
    #[tabled(rename = "Status")]
    #[serde(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    #[serde(rename = "Detail")]
    detail: String,
}

// -- Row builders --

fn build_leaderboard_rows(view: &LeaderboardView) -> Vec<LeaderboardRow> {
    view.entries
        .iter()
        .map(|e| LeaderboardRow {
            rank: e.rank,
            athlete: e.athlete_name.clone(),
            time: e.effort_duration.clone(),
            date: e.effort_date.clone(),
            effort_url: e.effort_url.clone(),
        })
        .collect()
}

/// Targets are site-absolute, i.e. prefixed with the climb namespace.
fn build_path_rows(paths: &[ClimbPaths]) -> Vec<PathRow> {
    paths
        .iter()
        .flat_map(|p| {
            p.mappings.iter().map(move |m| PathRow {
                climb: p.climb_name.clone(),
                facet: m.facet.to_string(),
                source: if m.is_canonical() {
                    p.published(&m.source_path)
                } else {
                    m.source_path.clone()
                },
                target: p.published(&m.canonical_path),
            })
        })
        .collect()
}

fn build_outcome_rows(summary: &RunSummary) -> Vec<OutcomeRow> {
    let published = summary.published.iter().map(|name| OutcomeRow {
        climb: name.clone(),
        status: "published".to_string(),
        detail: String::new(),
    });
    let failed = summary.failed.iter().map(|(name, err)| OutcomeRow {
        climb: name.clone(),
        status: "failed".to_string(),
        detail: err.clone(),
    });
    published.chain(failed).collect()
}

// -- Printers --

fn print_rows<T: Tabled + Serialize>(rows: Vec<T>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Csv => write_csv(&rows, std::io::stdout())?,
    }
    Ok(())
}

fn write_csv<T: Serialize, W: Write>(rows: &[T], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn print_leaderboard(view: &LeaderboardView, format: OutputFormat) -> Result<()> {
    print_rows(build_leaderboard_rows(view), format)
}

pub fn print_paths(paths: &[ClimbPaths], format: OutputFormat) -> Result<()> {
    print_rows(build_path_rows(paths), format)
}

pub fn print_run_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    print_rows(build_outcome_rows(summary), format)
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}
