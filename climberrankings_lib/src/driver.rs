//! Per-climb processing for a full run.
//!
//! Paths for every climb are resolved before any network traffic, so a
//! collision fails the run without side effects. Climbs then run on a bounded
//! pool (Semaphore + JoinSet + mpsc). A failing climb is reported and the
//! run moves on, unless the failure is fatal or the circuit breaker trips.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::climbs::Climb;
use crate::db::{CacheCounts, Db};
use crate::error::ClimbError;
use crate::leaderboard::{LeaderboardAggregator, PAGE_CAP};
use crate::paths::{ClimbPaths, PathRegistry};
use crate::provider::LeaderboardProvider;
use crate::render::{ClimbPage, PageRenderer, SegmentSummary};

/// Consecutive climb failures that stop the run.
pub const CIRCUIT_BREAKER_THRESHOLD: usize = 3;

/// Upper bound on climbs processed at once.
pub const MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub as_of_year: i32,
    pub concurrency: usize,
    /// Refetch segment details even when the cache has them.
    pub refresh_segments: bool,
    pub page_size: usize,
}

impl RunConfig {
    pub fn new(as_of_year: i32) -> Self {
        Self {
            as_of_year,
            concurrency: 4,
            refresh_segments: false,
            page_size: PAGE_CAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedClimb {
    pub files: Vec<PathBuf>,
    /// Ranked entries across the four views.
    pub entries: usize,
}

#[derive(Debug)]
pub struct ClimbOutcome {
    pub climb: String,
    pub segment_id: i64,
    pub result: Result<PublishedClimb, ClimbError>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub total: usize,
    pub published: Vec<String>,
    /// Climb name and error message.
    pub failed: Vec<(String, String)>,
    /// Set when remaining work was cancelled.
    pub aborted: Option<String>,
    pub cache: CacheCounts,
}

impl RunSummary {
    /// Climbs that never reported, because the run was aborted or a task panicked.
    pub fn skipped(&self) -> usize {
        self.total - self.published.len() - self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.aborted.is_none() && self.skipped() == 0
    }
}

struct CircuitBreaker {
    consecutive_failures: usize,
    threshold: usize,
}

impl CircuitBreaker {
    fn new(threshold: usize) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    fn is_tripped(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }
}

/// Builds and publishes every climb.
///
/// Returns `Err` only when the climbs cannot be resolved to publish paths or
/// the final cache counts cannot be read. Everything else lands in the
/// summary; `on_outcome` sees each climb as it finishes.
pub async fn run_climbs<P, R, F>(
    climbs: &[Climb],
    provider: Arc<P>,
    db: Arc<Mutex<Db>>,
    renderer: Arc<R>,
    config: &RunConfig,
    mut on_outcome: F,
) -> Result<RunSummary, ClimbError>
where
    P: LeaderboardProvider + 'static,
    R: PageRenderer + 'static,
    F: FnMut(&ClimbOutcome),
{
    let resolved = PathRegistry::resolve_all(climbs, config.as_of_year)?;

    let concurrency = config.concurrency.clamp(1, MAX_CONCURRENCY);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let (tx, mut rx) = mpsc::channel::<ClimbOutcome>(concurrency * 2);
    let mut join_set = JoinSet::new();

    for (climb, paths) in climbs.iter().cloned().zip(resolved) {
        let sem = Arc::clone(&semaphore);
        let sender = tx.clone();
        let provider = Arc::clone(&provider);
        let db = Arc::clone(&db);
        let renderer = Arc::clone(&renderer);
        let config = config.clone();

        join_set.spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            tracing::info!("Building '{}' (segment {})", climb.name, climb.segment_id);
            let result = process_climb(&climb, paths, provider, db, renderer.as_ref(), &config).await;
            let _ = sender
                .send(ClimbOutcome {
                    climb: climb.name,
                    segment_id: climb.segment_id,
                    result,
                })
                .await;
        });
    }
    drop(tx);

    let mut summary = RunSummary {
        total: climbs.len(),
        ..RunSummary::default()
    };
    let mut breaker = CircuitBreaker::new(CIRCUIT_BREAKER_THRESHOLD);

    while let Some(outcome) = rx.recv().await {
        on_outcome(&outcome);
        if let Some(reason) = record_outcome(&mut summary, &mut breaker, outcome) {
            summary.aborted = Some(reason);
            drain_buffered(&mut rx, &mut summary, &mut breaker, &mut on_outcome);
            join_set.abort_all();
            break;
        }
    }

    while let Some(joined) = join_set.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                tracing::error!("Climb task panicked: {}", e);
            }
        }
    }

    summary.cache = {
        let db = db.lock().unwrap_or_else(|e| e.into_inner());
        db.counts()?
    };
    Ok(summary)
}

/// Records outcomes already sent before an abort; those climbs finished.
fn drain_buffered<F: FnMut(&ClimbOutcome)>(
    rx: &mut mpsc::Receiver<ClimbOutcome>,
    summary: &mut RunSummary,
    breaker: &mut CircuitBreaker,
    on_outcome: &mut F,
) {
    while let Ok(outcome) = rx.try_recv() {
        on_outcome(&outcome);
        record_outcome(summary, breaker, outcome);
    }
}

/// Adds one outcome to the summary. Returns the abort reason when the outcome
/// is fatal or trips the breaker.
fn record_outcome(
    summary: &mut RunSummary,
    breaker: &mut CircuitBreaker,
    outcome: ClimbOutcome,
) -> Option<String> {
    match outcome.result {
        Ok(published) => {
            tracing::info!(
                "Published '{}': {} entries, {} files",
                outcome.climb,
                published.entries,
                published.files.len()
            );
            summary.published.push(outcome.climb);
            breaker.record_success();
            None
        }
        Err(err) => {
            tracing::error!("Climb '{}' failed: {}", outcome.climb, err);
            let reason = format!("'{}': {}", outcome.climb, err);
            summary.failed.push((outcome.climb, err.to_string()));
            breaker.record_failure();

            if err.is_fatal() {
                Some(reason)
            } else if breaker.is_tripped() {
                Some(format!(
                    "circuit breaker tripped after {} consecutive failures",
                    CIRCUIT_BREAKER_THRESHOLD
                ))
            } else {
                None
            }
        }
    }
}

async fn process_climb<P, R>(
    climb: &Climb,
    paths: ClimbPaths,
    provider: Arc<P>,
    db: Arc<Mutex<Db>>,
    renderer: &R,
    config: &RunConfig,
) -> Result<PublishedClimb, ClimbError>
where
    P: LeaderboardProvider,
    R: PageRenderer + ?Sized,
{
    let cached = if config.refresh_segments {
        None
    } else {
        let db = db.lock().unwrap_or_else(|e| e.into_inner());
        db.get_segment(climb.segment_id)?
    };
    let segment = match cached {
        Some(segment) => segment,
        None => {
            let segment = provider.get_segment(climb.segment_id).await?;
            let db = db.lock().unwrap_or_else(|e| e.into_inner());
            db.upsert_segment(&segment)?;
            segment
        }
    };

    let aggregator = LeaderboardAggregator::new(provider, db).with_page_size(config.page_size);
    let leaderboards = aggregator
        .build_leaderboards(climb.segment_id, config.as_of_year)
        .await?;
    let entries = leaderboards.views().iter().map(|v| v.entries.len()).sum();

    let page = ClimbPage {
        climb: climb.clone(),
        segment: SegmentSummary::from(&segment),
        leaderboards,
        paths,
    };
    let files = renderer.render(&page)?;
    Ok(PublishedClimb { files, entries })
}
