//! Publish paths for climb leaderboards.
//!
//! Every facet page has a canonical path under the climb's namespace
//! (`slugify(name)`). The default facet is also reachable through
//! redirects derived from the climb's name and aliases. Redirect sources
//! share one site-wide space, so the registry rejects any path two
//! claimants want instead of letting the later one win.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::climbs::Climb;
use crate::leaderboard::{Facet, TimeWindow};
use crate::model::Gender;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathCollisionError {
    #[error("'{text}' of climb '{climb}' has no characters usable in a path")]
    EmptySlug { climb: String, text: String },
    #[error("path {path} claimed by both {first} and {second}")]
    Duplicate {
        path: String,
        first: String,
        second: String,
    },
    #[error("redirect {path} from {claimant} would shadow the {facet} page")]
    ShadowsCanonical {
        path: String,
        claimant: String,
        facet: String,
    },
    #[error("namespace '{namespace}' claimed by both '{first}' and '{second}'")]
    DuplicateNamespace {
        namespace: String,
        first: String,
        second: String,
    },
}

fn non_alnum() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid slug regex"))
}

/// Lowercases and collapses every run of non-alphanumerics into one `-`,
/// without leading or trailing hyphens. May return an empty string.
pub fn slugify(s: &str) -> String {
    non_alnum()
        .replace_all(s, "-")
        .trim_matches('-')
        .to_ascii_lowercase()
}

/// `top-[<year>-]<male|female>-riders`
pub fn facet_slug(gender: Gender, window: TimeWindow) -> String {
    let mut raw = String::from("top-");
    if let TimeWindow::Year(year) = window {
        raw.push_str(&format!("{}-", year));
    }
    raw.push_str(match gender {
        Gender::Male => "male",
        Gender::Female => "female",
    });
    raw.push_str("-riders");
    slugify(&raw)
}

pub fn canonical_path(facet: &Facet) -> String {
    format!("/{}/index.html", facet.slug())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub source_path: String,
    pub canonical_path: String,
    pub facet: Facet,
}

impl PathMapping {
    pub fn is_canonical(&self) -> bool {
        self.source_path == self.canonical_path
    }
}

/// All mappings of one climb: canonical self-mappings first, then redirects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimbPaths {
    pub climb_name: String,
    pub namespace: String,
    pub mappings: Vec<PathMapping>,
}

impl ClimbPaths {
    pub fn canonical(&self, facet: &Facet) -> Option<&PathMapping> {
        self.mappings
            .iter()
            .find(|m| m.is_canonical() && m.facet == *facet)
    }

    pub fn redirects(&self) -> impl Iterator<Item = &PathMapping> {
        self.mappings.iter().filter(|m| !m.is_canonical())
    }

    /// Site-absolute location of a canonical page.
    pub fn published(&self, canonical_path: &str) -> String {
        format!("/{}{}", self.namespace, canonical_path)
    }
}

fn non_empty_slug(climb: &Climb, text: &str) -> Result<String, PathCollisionError> {
    let slug = slugify(text);
    if slug.is_empty() {
        return Err(PathCollisionError::EmptySlug {
            climb: climb.name.clone(),
            text: text.to_string(),
        });
    }
    Ok(slug)
}

/// Resolves one climb in isolation, rejecting collisions within it.
pub fn resolve_paths(climb: &Climb, facets: &[Facet]) -> Result<ClimbPaths, PathCollisionError> {
    let namespace = non_empty_slug(climb, &climb.name)?;

    let mut mappings: Vec<PathMapping> = Vec::new();
    let mut claimed: HashMap<String, String> = HashMap::new();

    for facet in facets {
        let canonical = canonical_path(facet);
        let claimant = format!("'{}' {} page", climb.name, facet);
        if let Some(first) = claimed.insert(canonical.clone(), claimant.clone()) {
            return Err(PathCollisionError::Duplicate {
                path: canonical,
                first,
                second: claimant,
            });
        }
        mappings.push(PathMapping {
            source_path: canonical.clone(),
            canonical_path: canonical,
            facet: *facet,
        });
    }

    if let Some(default) = facets.iter().find(|f| f.is_default()) {
        let target = canonical_path(default);
        let names = std::iter::once(&climb.name).chain(climb.aliases.iter());
        for text in names {
            let slug = non_empty_slug(climb, text)?;
            let claimant = format!("'{}' name '{}'", climb.name, text);
            for source in [
                format!("/climbs/{}/index.html", slug),
                format!("/{}/index.html", slug),
            ] {
                if let Some(facet) = facets.iter().find(|f| canonical_path(f) == source) {
                    return Err(PathCollisionError::ShadowsCanonical {
                        path: source,
                        claimant,
                        facet: facet.to_string(),
                    });
                }
                if let Some(first) = claimed.insert(source.clone(), claimant.clone()) {
                    return Err(PathCollisionError::Duplicate {
                        path: source,
                        first,
                        second: claimant,
                    });
                }
                mappings.push(PathMapping {
                    source_path: source,
                    canonical_path: target.clone(),
                    facet: *default,
                });
            }
        }
    }

    Ok(ClimbPaths {
        climb_name: climb.name.clone(),
        namespace,
        mappings,
    })
}

/// Site-wide claims on namespaces and redirect sources.
#[derive(Debug, Default)]
pub struct PathRegistry {
    namespaces: HashMap<String, String>,
    redirects: HashMap<String, String>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves and claims a climb's paths. On error nothing is claimed.
    pub fn register(
        &mut self,
        climb: &Climb,
        facets: &[Facet],
    ) -> Result<ClimbPaths, PathCollisionError> {
        let paths = resolve_paths(climb, facets)?;

        if let Some(first) = self.namespaces.get(&paths.namespace) {
            return Err(PathCollisionError::DuplicateNamespace {
                namespace: paths.namespace.clone(),
                first: first.clone(),
                second: climb.name.clone(),
            });
        }
        for mapping in paths.redirects() {
            if let Some(first) = self.redirects.get(&mapping.source_path) {
                return Err(PathCollisionError::Duplicate {
                    path: mapping.source_path.clone(),
                    first: format!("'{}'", first),
                    second: format!("'{}'", climb.name),
                });
            }
        }

        self.namespaces
            .insert(paths.namespace.clone(), climb.name.clone());
        for mapping in paths.redirects() {
            self.redirects
                .insert(mapping.source_path.clone(), climb.name.clone());
        }
        Ok(paths)
    }

    /// Resolves every climb for `as_of_year`, stopping at the first collision.
    pub fn resolve_all(
        climbs: &[Climb],
        as_of_year: i32,
    ) -> Result<Vec<ClimbPaths>, PathCollisionError> {
        let facets = Facet::all(as_of_year);
        let mut registry = Self::new();
        climbs
            .iter()
            .map(|climb| registry.register(climb, &facets))
            .collect()
    }
}
