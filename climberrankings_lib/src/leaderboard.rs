//! Ranked leaderboard views built from provider efforts.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::climbs::ConfigError;
use crate::db::Db;
use crate::error::ClimbError;
use crate::model::{DateRange, Effort, Gender};
use crate::paths::facet_slug;
use crate::provider::LeaderboardProvider;

/// Efforts requested per facet.
pub const PAGE_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Overall,
    Year(i32),
}

impl TimeWindow {
    /// Date bounds for the window. `Overall` is unbounded.
    pub fn range(&self) -> Result<Option<DateRange>, ConfigError> {
        match self {
            TimeWindow::Overall => Ok(None),
            TimeWindow::Year(year) => DateRange::year(*year)
                .map(Some)
                .ok_or(ConfigError::InvalidYear(*year)),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::Overall => write!(f, "all time"),
            TimeWindow::Year(year) => write!(f, "{}", year),
        }
    }
}

/// One of the four ranked views of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Facet {
    pub gender: Gender,
    pub window: TimeWindow,
}

impl Facet {
    pub fn new(gender: Gender, window: TimeWindow) -> Self {
        Self { gender, window }
    }

    /// Male overall: the facet that also receives name and alias redirects.
    pub fn default_facet() -> Self {
        Self::new(Gender::Male, TimeWindow::Overall)
    }

    /// Male overall, female overall, male yearly, female yearly.
    pub fn all(as_of_year: i32) -> [Facet; 4] {
        [
            Facet::new(Gender::Male, TimeWindow::Overall),
            Facet::new(Gender::Female, TimeWindow::Overall),
            Facet::new(Gender::Male, TimeWindow::Year(as_of_year)),
            Facet::new(Gender::Female, TimeWindow::Year(as_of_year)),
        ]
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default_facet()
    }

    pub fn slug(&self) -> String {
        facet_slug(self.gender, self.window)
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.gender, self.window)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub athlete_id: i64,
    pub athlete_name: String,
    pub effort_id: i64,
    pub effort_url: String,
    /// e.g. `9 Mar 2024`
    pub effort_date: String,
    /// `m:ss`, or `h:mm:ss` from one hour up.
    pub effort_duration: String,
    /// Elapsed seconds; lower is better.
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardView {
    pub segment_id: i64,
    pub facet: Facet,
    pub entries: Vec<LeaderboardEntry>,
}

/// The four views of one segment, all for the same `as_of_year`.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaderboards {
    pub male_overall: LeaderboardView,
    pub female_overall: LeaderboardView,
    pub male_yearly: LeaderboardView,
    pub female_yearly: LeaderboardView,
}

impl Leaderboards {
    /// In [`Facet::all`] order.
    pub fn views(&self) -> [&LeaderboardView; 4] {
        [
            &self.male_overall,
            &self.female_overall,
            &self.male_yearly,
            &self.female_yearly,
        ]
    }
}

/// Formats elapsed seconds as `m:ss` or `h:mm:ss`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Ranks efforts fastest first.
///
/// Ties on elapsed time go to the earlier start, then the lower athlete id,
/// then the lower effort id. Repeated effort ids keep their best-ranked copy.
/// Efforts on other segments are dropped.
pub fn rank_efforts(segment_id: i64, facet: Facet, mut efforts: Vec<Effort>) -> LeaderboardView {
    let before = efforts.len();
    efforts.retain(|e| e.segment.id == segment_id);
    if efforts.len() != before {
        tracing::warn!(
            "segment {}: dropped {} efforts belonging to other segments",
            segment_id,
            before - efforts.len()
        );
    }

    efforts.sort_by(|a, b| {
        a.elapsed_time
            .cmp(&b.elapsed_time)
            .then_with(|| a.start_date.cmp(&b.start_date))
            .then_with(|| a.athlete.id.cmp(&b.athlete.id))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut seen = HashSet::new();
    efforts.retain(|e| seen.insert(e.id));

    let entries = efforts
        .iter()
        .enumerate()
        .map(|(i, e)| LeaderboardEntry {
            rank: i + 1,
            athlete_id: e.athlete.id,
            athlete_name: e.athlete.name.clone(),
            effort_id: e.id,
            effort_url: e.url(),
            effort_date: e.start_date.format("%-d %b %Y").to_string(),
            effort_duration: format_duration(e.elapsed_time),
            score: e.elapsed_time,
        })
        .collect();

    LeaderboardView {
        segment_id,
        facet,
        entries,
    }
}

/// Ranks cached efforts for one facet without touching the provider.
pub fn cached_leaderboard(
    db: &Db,
    segment_id: i64,
    facet: Facet,
    limit: Option<usize>,
) -> Result<LeaderboardView, ClimbError> {
    let range = facet.window.range()?;
    let efforts = db.efforts_for_segment(segment_id, Some(facet.gender), range.as_ref())?;
    let mut view = rank_efforts(segment_id, facet, efforts);
    if let Some(limit) = limit {
        view.entries.truncate(limit);
    }
    Ok(view)
}

/// Fetches, caches and ranks the four facets of a segment.
pub struct LeaderboardAggregator<P> {
    provider: Arc<P>,
    db: Arc<Mutex<Db>>,
    page_size: usize,
}

impl<P: LeaderboardProvider> LeaderboardAggregator<P> {
    pub fn new(provider: Arc<P>, db: Arc<Mutex<Db>>) -> Self {
        Self {
            provider,
            db,
            page_size: PAGE_CAP,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Builds all four views. The first failing facet aborts the segment.
    pub async fn build_leaderboards(
        &self,
        segment_id: i64,
        as_of_year: i32,
    ) -> Result<Leaderboards, ClimbError> {
        TimeWindow::Year(as_of_year).range()?;
        let [male_overall, female_overall, male_yearly, female_yearly] = Facet::all(as_of_year);
        Ok(Leaderboards {
            male_overall: self.build_view(segment_id, male_overall).await?,
            female_overall: self.build_view(segment_id, female_overall).await?,
            male_yearly: self.build_view(segment_id, male_yearly).await?,
            female_yearly: self.build_view(segment_id, female_yearly).await?,
        })
    }

    async fn build_view(&self, segment_id: i64, facet: Facet) -> Result<LeaderboardView, ClimbError> {
        let range = facet.window.range()?;
        let efforts = self
            .provider
            .list_efforts(segment_id, facet.gender, range, self.page_size)
            .await?;

        {
            let mut db = self.db.lock().unwrap_or_else(|e| e.into_inner());
            db.upsert_efforts(&efforts)?;
        }

        let view = rank_efforts(segment_id, facet, efforts);
        tracing::info!(
            "segment {}: {} leaderboard ranked {} efforts",
            segment_id,
            facet,
            view.entries.len()
        );
        Ok(view)
    }
}
