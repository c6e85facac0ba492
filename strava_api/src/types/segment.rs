use serde::{Deserialize, Serialize};

/// Segment metadata returned by `GET /segments/{id}` and embedded in efforts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDetail {
    pub id: i64,
    pub name: String,
    /// Length in meters.
    pub distance: f64,
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub elevation_high: f64,
    #[serde(default)]
    pub elevation_low: f64,
}
