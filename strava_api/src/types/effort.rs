use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AthleteSummary, SegmentDetail};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRef {
    pub id: i64,
}

/// One timed traversal of a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEffort {
    pub id: i64,
    /// Seconds from segment start to segment end.
    pub elapsed_time: i64,
    pub start_date: DateTime<Utc>,
    pub activity: ActivityRef,
    pub athlete: AthleteSummary,
    pub segment: SegmentDetail,
}
