//! Normalized entities persisted by the cache and exchanged with the provider.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strava_api::types::{SegmentDetail, SegmentEffort};

pub use strava_api::types::Gender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Athlete {
    pub id: i64,
    pub name: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub name: String,
    /// Meters.
    pub distance: f64,
    pub total_elevation_gain: f64,
    pub elevation_high: f64,
    pub elevation_low: f64,
}

impl Segment {
    /// Reported elevation gain, or the high/low difference when the provider
    /// reports zero gain.
    pub fn elevation_gain(&self) -> f64 {
        if self.total_elevation_gain == 0.0 {
            self.elevation_high - self.elevation_low
        } else {
            self.total_elevation_gain
        }
    }

    /// Average grade in percent.
    pub fn grade(&self) -> f64 {
        if self.distance <= 0.0 {
            return 0.0;
        }
        self.elevation_gain() / self.distance * 100.0
    }

    pub fn midpoint_altitude(&self) -> f64 {
        (self.elevation_low + self.elevation_high) / 2.0
    }
}

impl From<SegmentDetail> for Segment {
    fn from(s: SegmentDetail) -> Self {
        Self {
            id: s.id,
            name: s.name,
            distance: s.distance,
            total_elevation_gain: s.total_elevation_gain,
            elevation_high: s.elevation_high,
            elevation_low: s.elevation_low,
        }
    }
}

/// An effort with its segment and athlete inlined, as observed in a provider
/// response and as returned by the joined cache read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effort {
    pub id: i64,
    pub segment: Segment,
    pub athlete: Athlete,
    pub activity_id: i64,
    /// Seconds.
    pub elapsed_time: i64,
    pub start_date: DateTime<Utc>,
}

impl Effort {
    /// Converts a provider effort. Athletes who hide their sex inherit the
    /// gender the leaderboard was filtered by.
    pub fn from_api(effort: SegmentEffort, filtered_gender: Gender) -> Self {
        let athlete = Athlete {
            id: effort.athlete.id,
            name: effort.athlete.display_name(),
            gender: effort.athlete.sex.unwrap_or(filtered_gender),
        };
        Self {
            id: effort.id,
            segment: effort.segment.into(),
            athlete,
            activity_id: effort.activity.id,
            elapsed_time: effort.elapsed_time,
            start_date: effort.start_date,
        }
    }

    pub fn row(&self) -> EffortRow {
        EffortRow {
            id: self.id,
            segment_id: self.segment.id,
            athlete_id: self.athlete.id,
            activity_id: self.activity_id,
            elapsed_time: self.elapsed_time,
            start_date: self.start_date,
        }
    }

    pub fn url(&self) -> String {
        format!("https://www.strava.com/segment_efforts/{}", self.id)
    }
}

/// The flat `efforts` row: foreign keys instead of inlined entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortRow {
    pub id: i64,
    pub segment_id: i64,
    pub athlete_id: i64,
    pub activity_id: i64,
    pub elapsed_time: i64,
    pub start_date: DateTime<Utc>,
}

/// Inclusive UTC time bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// `[Jan 1 00:00:00, Dec 31 23:59:59.999999999]` of `year`, or `None` when
    /// the year is outside chrono's range.
    pub fn year(year: i32) -> Option<Self> {
        let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
        let next = Utc.with_ymd_and_hms(year.checked_add(1)?, 1, 1, 0, 0, 0).single()?;
        Some(Self {
            start,
            end: next - Duration::nanoseconds(1),
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(gain: f64, low: f64, high: f64) -> Segment {
        Segment {
            id: 1,
            name: "Test".to_string(),
            distance: 1000.0,
            total_elevation_gain: gain,
            elevation_high: high,
            elevation_low: low,
        }
    }

    #[test]
    fn elevation_gain_falls_back_to_high_minus_low() {
        assert_eq!(segment(0.0, 100.0, 180.0).elevation_gain(), 80.0);
        assert_eq!(segment(95.0, 100.0, 180.0).elevation_gain(), 95.0);
    }

    #[test]
    fn grade_and_midpoint() {
        let s = segment(80.0, 100.0, 180.0);
        assert!((s.grade() - 8.0).abs() < 1e-9);
        assert_eq!(s.midpoint_altitude(), 140.0);
    }

    #[test]
    fn grade_zero_distance() {
        let mut s = segment(80.0, 0.0, 0.0);
        s.distance = 0.0;
        assert_eq!(s.grade(), 0.0);
    }

    #[test]
    fn year_range_bounds() {
        let range = DateRange::year(2024).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            range.end,
            Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()
                + Duration::nanoseconds(999_999_999)
        );
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
    }
}
