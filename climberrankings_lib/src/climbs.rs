//! Loading and validating climb definitions.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A named climb tracked by one provider segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Climb {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub segment_id: i64,
}

impl Climb {
    pub fn new(name: &str, aliases: &[&str], segment_id: i64) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            segment_id,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read climbs file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse climbs file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("unsupported climbs file extension '{0}' (expected .json, .yaml, .yml or .toml)")]
    UnsupportedFormat(String),
    #[error("climb #{index} has an empty name")]
    EmptyName { index: usize },
    #[error("climb '{name}' is missing a positive segment_id")]
    MissingSegmentId { name: String },
    #[error("segment {segment_id} is used by both '{first}' and '{second}'")]
    DuplicateSegment {
        segment_id: i64,
        first: String,
        second: String,
    },
    #[error("climbs file {0} defines no climbs")]
    Empty(String),
    #[error("invalid year {0}")]
    InvalidYear(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimbsFormat {
    Json,
    Yaml,
    Toml,
}

impl ClimbsFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(ext)),
        }
    }
}

/// TOML has no top-level arrays, so climbs live under `[[climbs]]`.
#[derive(Deserialize)]
struct TomlClimbs {
    #[serde(default)]
    climbs: Vec<Climb>,
}

/// Reads, parses and validates a climbs file.
pub fn load_climbs(path: &Path) -> Result<Vec<Climb>, ConfigError> {
    let shown = path.display().to_string();
    let format = ClimbsFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: shown.clone(),
        source,
    })?;
    let climbs = parse_climbs(&content, format).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: shown.clone(),
            message,
        },
        other => other,
    })?;
    if climbs.is_empty() {
        return Err(ConfigError::Empty(shown));
    }
    validate_climbs(&climbs)?;
    tracing::info!("Loaded {} climbs from {}", climbs.len(), shown);
    Ok(climbs)
}

/// Parses climbs without validating them.
pub fn parse_climbs(content: &str, format: ClimbsFormat) -> Result<Vec<Climb>, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: "<input>".to_string(),
        message,
    };
    match format {
        ClimbsFormat::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        ClimbsFormat::Yaml => serde_yml::from_str(content).map_err(|e| parse_err(e.to_string())),
        ClimbsFormat::Toml => toml::from_str::<TomlClimbs>(content)
            .map(|t| t.climbs)
            .map_err(|e| parse_err(e.to_string())),
    }
}

/// Rejects empty names, non-positive segment ids and segments shared by two climbs.
pub fn validate_climbs(climbs: &[Climb]) -> Result<(), ConfigError> {
    let mut seen: HashMap<i64, &str> = HashMap::new();
    for (index, climb) in climbs.iter().enumerate() {
        if climb.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { index });
        }
        if climb.segment_id <= 0 {
            return Err(ConfigError::MissingSegmentId {
                name: climb.name.clone(),
            });
        }
        if let Some(first) = seen.insert(climb.segment_id, &climb.name) {
            return Err(ConfigError::DuplicateSegment {
                segment_id: climb.segment_id,
                first: first.to_string(),
                second: climb.name.clone(),
            });
        }
    }
    Ok(())
}
