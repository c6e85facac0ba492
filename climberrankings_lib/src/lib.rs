//! Library layer for Climber Rankings: leaderboard aggregation, entity cache,
//! publish path resolution and rendering.
//!
//! Wraps the `strava_api` crate with rate limiting, retry and a SQLite cache,
//! and turns raw segment efforts into four ranked views per climb.

pub mod cache;
pub mod climbs;
pub mod db;
pub mod driver;
pub mod error;
pub mod leaderboard;
pub mod model;
pub mod paths;
pub mod provider;
pub mod render;
pub mod retry;

pub use strava_api;

pub use climbs::{load_climbs, Climb, ConfigError};
pub use db::{CacheCounts, Db, DbError};
pub use driver::{run_climbs, ClimbOutcome, RunConfig, RunSummary, MAX_CONCURRENCY};
pub use error::ClimbError;
pub use leaderboard::{
    cached_leaderboard, rank_efforts, Facet, LeaderboardAggregator, LeaderboardEntry,
    LeaderboardView, Leaderboards, TimeWindow, PAGE_CAP,
};
pub use model::{Athlete, DateRange, Effort, EffortRow, Gender, Segment};
pub use paths::{ClimbPaths, PathCollisionError, PathMapping, PathRegistry};
pub use provider::{LeaderboardProvider, ProviderError, StravaProvider};
pub use render::{ClimbPage, JsonSiteRenderer, PageRenderer, RenderError, SegmentSummary};
pub use retry::{RateLimiter, RetryConfig};
