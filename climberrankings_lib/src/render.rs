//! Output of ranked climb pages.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::climbs::Climb;
use crate::leaderboard::{Facet, LeaderboardEntry, Leaderboards};
use crate::model::Segment;
use crate::paths::ClimbPaths;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize page: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("climb '{climb}' has no canonical path for the {facet} facet")]
    MissingPath { climb: String, facet: String },
}

/// Physical summary shown alongside each leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment_id: i64,
    pub name: String,
    /// Meters.
    pub distance: f64,
    pub elevation_gain: f64,
    /// Percent.
    pub grade: f64,
    pub midpoint_altitude: f64,
}

impl From<&Segment> for SegmentSummary {
    fn from(segment: &Segment) -> Self {
        Self {
            segment_id: segment.id,
            name: segment.name.clone(),
            distance: segment.distance,
            elevation_gain: segment.elevation_gain(),
            grade: segment.grade(),
            midpoint_altitude: segment.midpoint_altitude(),
        }
    }
}

/// Everything needed to publish one climb.
#[derive(Debug, Clone)]
pub struct ClimbPage {
    pub climb: Climb,
    pub segment: SegmentSummary,
    pub leaderboards: Leaderboards,
    pub paths: ClimbPaths,
}

pub trait PageRenderer: Send + Sync {
    /// Publishes the page, returning the files written.
    fn render(&self, page: &ClimbPage) -> Result<Vec<PathBuf>, RenderError>;
}

#[derive(Serialize)]
struct LeaderboardDocument<'a> {
    climb: &'a Climb,
    segment: &'a SegmentSummary,
    facet: Facet,
    title: String,
    canonical_path: String,
    entries: &'a [LeaderboardEntry],
}

#[derive(Serialize)]
struct Redirect<'a> {
    from: &'a str,
    to: String,
}

#[derive(Serialize)]
struct RedirectDocument<'a> {
    namespace: &'a str,
    redirects: Vec<Redirect<'a>>,
}

/// Writes `<out>/<namespace>/<facet>/leaderboard.json` per facet and
/// `<out>/<namespace>/redirects.json`.
pub struct JsonSiteRenderer {
    out_dir: PathBuf,
}

impl JsonSiteRenderer {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    fn write(&self, path: PathBuf, body: String) -> Result<PathBuf, RenderError> {
        let io_err = |source| RenderError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&path, body).map_err(io_err)?;
        Ok(path)
    }
}

impl PageRenderer for JsonSiteRenderer {
    fn render(&self, page: &ClimbPage) -> Result<Vec<PathBuf>, RenderError> {
        let namespace_dir = self.out_dir.join(&page.paths.namespace);
        let mut written = Vec::new();

        for view in page.leaderboards.views() {
            let mapping =
                page.paths
                    .canonical(&view.facet)
                    .ok_or_else(|| RenderError::MissingPath {
                        climb: page.climb.name.clone(),
                        facet: view.facet.to_string(),
                    })?;
            let relative = Path::new(mapping.canonical_path.trim_start_matches('/'));
            let dir = match relative.parent() {
                Some(parent) => namespace_dir.join(parent),
                None => namespace_dir.clone(),
            };

            let doc = LeaderboardDocument {
                climb: &page.climb,
                segment: &page.segment,
                facet: view.facet,
                title: format!("{}: {}", page.climb.name, view.facet),
                canonical_path: page.paths.published(&mapping.canonical_path),
                entries: &view.entries,
            };
            let body = serde_json::to_string_pretty(&doc)?;
            written.push(self.write(dir.join("leaderboard.json"), body)?);
        }

        let redirects = RedirectDocument {
            namespace: &page.paths.namespace,
            redirects: page
                .paths
                .redirects()
                .map(|m| Redirect {
                    from: &m.source_path,
                    to: page.paths.published(&m.canonical_path),
                })
                .collect(),
        };
        let body = serde_json::to_string_pretty(&redirects)?;
        written.push(self.write(namespace_dir.join("redirects.json"), body)?);

        tracing::debug!(
            "rendered '{}' into {} files",
            page.climb.name,
            written.len()
        );
        Ok(written)
    }
}
