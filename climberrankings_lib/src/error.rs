//! Error types for the library layer.

use std::fmt;

use crate::climbs::ConfigError;
use crate::db::DbError;
use crate::paths::PathCollisionError;
use crate::provider::ProviderError;
use crate::render::RenderError;

/// Any failure while building a climb's leaderboards.
#[derive(Debug)]
pub enum ClimbError {
    /// The leaderboard provider failed (after retries for transient errors).
    Provider(ProviderError),
    /// The entity cache could not be read or written.
    Cache(DbError),
    /// Climb definitions or run parameters are invalid.
    Config(ConfigError),
    /// Two claimants want the same publish path.
    Paths(PathCollisionError),
    /// Output could not be written.
    Render(RenderError),
}

impl ClimbError {
    /// Whether the whole run must stop rather than just this climb.
    ///
    /// Rejected credentials fail every later request too. Cache, config and
    /// path errors mean the run's shared state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_unauthorized(),
            Self::Cache(_) | Self::Config(_) | Self::Paths(_) => true,
            Self::Render(_) => false,
        }
    }
}

impl fmt::Display for ClimbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(e) => write!(f, "Provider error: {}", e),
            Self::Cache(e) => write!(f, "Cache error: {}", e),
            Self::Config(e) => write!(f, "Config error: {}", e),
            Self::Paths(e) => write!(f, "Path collision: {}", e),
            Self::Render(e) => write!(f, "Render error: {}", e),
        }
    }
}

impl std::error::Error for ClimbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Provider(e) => Some(e),
            Self::Cache(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Paths(e) => Some(e),
            Self::Render(e) => Some(e),
        }
    }
}

impl From<ProviderError> for ClimbError {
    fn from(e: ProviderError) -> Self {
        Self::Provider(e)
    }
}

impl From<DbError> for ClimbError {
    fn from(e: DbError) -> Self {
        Self::Cache(e)
    }
}

impl From<ConfigError> for ClimbError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PathCollisionError> for ClimbError {
    fn from(e: PathCollisionError) -> Self {
        Self::Paths(e)
    }
}

impl From<RenderError> for ClimbError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}
