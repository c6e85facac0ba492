//! SQLite entity cache for athletes, segments and efforts.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{Athlete, DateRange, Effort, EffortRow, Gender, Segment};

/// Schema version written to `PRAGMA user_version` by [`Db::init`].
const SCHEMA_VERSION: i32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i32, supported: i32 },
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheCounts {
    pub athletes: i64,
    pub segments: i64,
    pub efforts: i64,
}

pub struct Db {
    conn: Connection,
}

const EFFORT_DETAIL_SELECT: &str = "SELECT e.id, e.activity_id, e.elapsed_time, e.start_date,
            a.id, a.name, a.gender,
            s.id, s.name, s.distance, s.total_elevation_gain, s.elevation_high, s.elevation_low
     FROM efforts e
     JOIN athletes a ON a.id = e.athlete_id
     JOIN segments s ON s.id = e.segment_id";

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for tests and ad-hoc queries).
    #[doc(hidden)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Creates the tables if missing. Safe to call on every start.
    pub fn init(&self) -> Result<(), DbError> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(DbError::SchemaTooNew {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }

        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;

        if version < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    pub fn upsert_athlete(&self, athlete: &Athlete) -> Result<(), DbError> {
        upsert_athlete_in(&self.conn, athlete)?;
        Ok(())
    }

    pub fn upsert_segment(&self, segment: &Segment) -> Result<(), DbError> {
        upsert_segment_in(&self.conn, segment)?;
        Ok(())
    }

    /// Writes the effort's segment, then its athlete, then the effort row, in
    /// one transaction. If any step fails none of the three rows change.
    ///
    /// The embedded segment is a summary: zero metrics never replace cached
    /// non-zero ones, so a detail row from [`Db::upsert_segment`] survives.
    pub fn upsert_effort(&mut self, effort: &Effort) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        merge_segment_summary_in(&tx, &effort.segment)?;
        upsert_athlete_in(&tx, &effort.athlete)?;
        upsert_effort_row_in(&tx, &effort.row())?;
        tx.commit()?;
        Ok(())
    }

    /// Upserts each effort in its own transaction, stopping at the first
    /// failure. Returns the number written.
    pub fn upsert_efforts(&mut self, efforts: &[Effort]) -> Result<usize, DbError> {
        for effort in efforts {
            self.upsert_effort(effort)?;
        }
        Ok(efforts.len())
    }

    pub fn get_athlete(&self, athlete_id: i64) -> Result<Option<Athlete>, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, gender FROM athletes WHERE id = ?1",
                params![athlete_id],
                |row| {
                    Ok(Athlete {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        gender: gender_column(row, 2)?,
                    })
                },
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn get_segment(&self, segment_id: i64) -> Result<Option<Segment>, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, distance, total_elevation_gain, elevation_high, elevation_low
                 FROM segments WHERE id = ?1",
                params![segment_id],
                |row| {
                    Ok(Segment {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        distance: row.get(2)?,
                        total_elevation_gain: row.get(3)?,
                        elevation_high: row.get(4)?,
                        elevation_low: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(DbError::from)
    }

    /// Point lookup of the flat effort row.
    pub fn get_effort(&self, effort_id: i64) -> Result<Option<EffortRow>, DbError> {
        self.conn
            .query_row(
                "SELECT id, segment_id, athlete_id, activity_id, elapsed_time, start_date
                 FROM efforts WHERE id = ?1",
                params![effort_id],
                |row| {
                    Ok(EffortRow {
                        id: row.get(0)?,
                        segment_id: row.get(1)?,
                        athlete_id: row.get(2)?,
                        activity_id: row.get(3)?,
                        elapsed_time: row.get(4)?,
                        start_date: date_column(row, 5)?,
                    })
                },
            )
            .optional()
            .map_err(DbError::from)
    }

    /// The effort with its segment and athlete joined in.
    pub fn get_effort_detail(&self, effort_id: i64) -> Result<Option<Effort>, DbError> {
        self.conn
            .query_row(
                &format!("{} WHERE e.id = ?1", EFFORT_DETAIL_SELECT),
                params![effort_id],
                effort_from_row,
            )
            .optional()
            .map_err(DbError::from)
    }

    /// Cached efforts on a segment, optionally narrowed by athlete gender and
    /// start date. Unordered; callers rank.
    pub fn efforts_for_segment(
        &self,
        segment_id: i64,
        gender: Option<Gender>,
        range: Option<&DateRange>,
    ) -> Result<Vec<Effort>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE e.segment_id = ?1 AND (?2 IS NULL OR a.gender = ?2)",
            EFFORT_DETAIL_SELECT
        ))?;
        let rows = stmt.query_map(
            params![segment_id, gender.map(|g| g.code())],
            effort_from_row,
        )?;

        let mut efforts = Vec::new();
        for row in rows {
            let effort = row?;
            if range.map_or(true, |r| r.contains(effort.start_date)) {
                efforts.push(effort);
            }
        }
        Ok(efforts)
    }

    pub fn counts(&self) -> Result<CacheCounts, DbError> {
        let count = |table: &str| -> Result<i64, DbError> {
            Ok(self
                .conn
                .query_row(&format!("SELECT COUNT(1) FROM {}", table), [], |row| {
                    row.get(0)
                })?)
        };
        Ok(CacheCounts {
            athletes: count("athletes")?,
            segments: count("segments")?,
            efforts: count("efforts")?,
        })
    }
}

fn upsert_athlete_in(conn: &Connection, athlete: &Athlete) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO athletes (id, name, gender)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           gender = excluded.gender",
        params![athlete.id, athlete.name, athlete.gender.code()],
    )?;
    Ok(())
}

fn upsert_segment_in(conn: &Connection, segment: &Segment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO segments (id, name, distance, total_elevation_gain, elevation_high, elevation_low)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           distance = excluded.distance,
           total_elevation_gain = excluded.total_elevation_gain,
           elevation_high = excluded.elevation_high,
           elevation_low = excluded.elevation_low",
        params![
            segment.id,
            segment.name,
            segment.distance,
            segment.total_elevation_gain,
            segment.elevation_high,
            segment.elevation_low
        ],
    )?;
    Ok(())
}

fn merge_segment_summary_in(conn: &Connection, segment: &Segment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO segments (id, name, distance, total_elevation_gain, elevation_high, elevation_low)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           distance = CASE WHEN excluded.distance <> 0
             THEN excluded.distance ELSE segments.distance END,
           total_elevation_gain = CASE WHEN excluded.total_elevation_gain <> 0
             THEN excluded.total_elevation_gain ELSE segments.total_elevation_gain END,
           elevation_high = CASE WHEN excluded.elevation_high <> 0
             THEN excluded.elevation_high ELSE segments.elevation_high END,
           elevation_low = CASE WHEN excluded.elevation_low <> 0
             THEN excluded.elevation_low ELSE segments.elevation_low END",
        params![
            segment.id,
            segment.name,
            segment.distance,
            segment.total_elevation_gain,
            segment.elevation_high,
            segment.elevation_low
        ],
    )?;
    Ok(())
}

fn upsert_effort_row_in(conn: &Connection, effort: &EffortRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO efforts (id, segment_id, athlete_id, activity_id, elapsed_time, start_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           segment_id = excluded.segment_id,
           athlete_id = excluded.athlete_id,
           activity_id = excluded.activity_id,
           elapsed_time = excluded.elapsed_time,
           start_date = excluded.start_date",
        params![
            effort.id,
            effort.segment_id,
            effort.athlete_id,
            effort.activity_id,
            effort.elapsed_time,
            format_date(&effort.start_date)
        ],
    )?;
    Ok(())
}

fn effort_from_row(row: &Row<'_>) -> rusqlite::Result<Effort> {
    Ok(Effort {
        id: row.get(0)?,
        activity_id: row.get(1)?,
        elapsed_time: row.get(2)?,
        start_date: date_column(row, 3)?,
        athlete: Athlete {
            id: row.get(4)?,
            name: row.get(5)?,
            gender: gender_column(row, 6)?,
        },
        segment: Segment {
            id: row.get(7)?,
            name: row.get(8)?,
            distance: row.get(9)?,
            total_elevation_gain: row.get(10)?,
            elevation_high: row.get(11)?,
            elevation_low: row.get(12)?,
        },
    })
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn gender_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Gender> {
    let code: String = row.get(idx)?;
    code.parse::<Gender>().map_err(|msg| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open_test_db() -> Db {
        let db = Db::open_in_memory().expect("open");
        db.init().expect("init");
        db
    }

    fn get_user_version(db: &Db) -> i32 {
        db.conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap()
    }

    fn make_segment(id: i64) -> Segment {
        Segment {
            id,
            name: "Old La Honda".to_string(),
            distance: 4880.4,
            total_elevation_gain: 386.2,
            elevation_high: 515.2,
            elevation_low: 129.0,
        }
    }

    fn make_athlete(id: i64, gender: Gender) -> Athlete {
        Athlete {
            id,
            name: format!("Rider {}", id),
            gender,
        }
    }

    fn make_effort(id: i64, athlete: Athlete, elapsed: i64) -> Effort {
        Effort {
            id,
            segment: make_segment(101),
            athlete,
            activity_id: id * 10,
            elapsed_time: elapsed,
            start_date: Utc.with_ymd_and_hms(2024, 3, 9, 15, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_init_sets_version() {
        let db = open_test_db();
        assert_eq!(get_user_version(&db), SCHEMA_VERSION);
    }

    #[test]
    fn test_init_idempotent() {
        let db = open_test_db();
        db.init().expect("second init");
        assert_eq!(get_user_version(&db), SCHEMA_VERSION);
    }

    #[test]
    fn test_init_rejects_newer_schema() {
        let db = Db::open_in_memory().unwrap();
        db.conn().pragma_update(None, "user_version", 99).unwrap();
        assert!(matches!(
            db.init(),
            Err(DbError::SchemaTooNew { found: 99, .. })
        ));
    }

    #[test]
    fn test_athlete_round_trip() {
        let db = open_test_db();
        let athlete = make_athlete(648204, Gender::Male);
        db.upsert_athlete(&athlete).unwrap();
        assert_eq!(db.get_athlete(648204).unwrap(), Some(athlete));
    }

    #[test]
    fn test_segment_round_trip() {
        let db = open_test_db();
        let segment = make_segment(101);
        db.upsert_segment(&segment).unwrap();
        assert_eq!(db.get_segment(101).unwrap(), Some(segment));
    }

    #[test]
    fn test_missing_rows_are_none() {
        let db = open_test_db();
        assert_eq!(db.get_athlete(1).unwrap(), None);
        assert_eq!(db.get_segment(1).unwrap(), None);
        assert_eq!(db.get_effort(1).unwrap(), None);
        assert_eq!(db.get_effort_detail(1).unwrap(), None);
    }

    #[test]
    fn test_effort_round_trip() {
        let mut db = open_test_db();
        let effort = make_effort(2920055998, make_athlete(7, Gender::Female), 990);
        db.upsert_effort(&effort).unwrap();

        assert_eq!(db.get_effort(effort.id).unwrap(), Some(effort.row()));
        assert_eq!(db.get_effort_detail(effort.id).unwrap(), Some(effort.clone()));
        assert_eq!(db.get_segment(101).unwrap(), Some(effort.segment.clone()));
        assert_eq!(db.get_athlete(7).unwrap(), Some(effort.athlete));
    }

    #[test]
    fn test_effort_round_trip_keeps_subsecond_start() {
        let mut db = open_test_db();
        let mut effort = make_effort(5, make_athlete(7, Gender::Male), 600);
        effort.start_date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        db.upsert_effort(&effort).unwrap();
        assert_eq!(db.get_effort(5).unwrap().unwrap().start_date, effort.start_date);
    }

    #[test]
    fn test_upsert_effort_twice_is_idempotent() {
        let mut db = open_test_db();
        let effort = make_effort(1, make_athlete(7, Gender::Male), 600);
        db.upsert_effort(&effort).unwrap();
        db.upsert_effort(&effort).unwrap();

        let counts = db.counts().unwrap();
        assert_eq!(
            counts,
            CacheCounts {
                athletes: 1,
                segments: 1,
                efforts: 1
            }
        );
        assert_eq!(db.get_effort_detail(1).unwrap(), Some(effort));
    }

    #[test]
    fn test_upsert_overwrites_mutable_fields() {
        let mut db = open_test_db();
        db.upsert_effort(&make_effort(1, make_athlete(7, Gender::Male), 600))
            .unwrap();

        let mut renamed = make_athlete(7, Gender::Female);
        renamed.name = "Renamed Rider".to_string();
        let mut updated = make_effort(1, renamed.clone(), 590);
        updated.segment.name = "Old La Honda (corrected)".to_string();
        db.upsert_effort(&updated).unwrap();

        assert_eq!(db.get_athlete(7).unwrap(), Some(renamed));
        assert_eq!(db.get_effort(1).unwrap().unwrap().elapsed_time, 590);
        assert_eq!(
            db.get_segment(101).unwrap().unwrap().name,
            "Old La Honda (corrected)"
        );
    }

    #[test]
    fn test_effort_summary_keeps_cached_elevation() {
        let mut db = open_test_db();
        let detail = make_segment(101);
        db.upsert_segment(&detail).unwrap();

        let mut effort = make_effort(1, make_athlete(7, Gender::Male), 600);
        effort.segment.total_elevation_gain = 0.0;
        effort.segment.elevation_high = 0.0;
        effort.segment.elevation_low = 0.0;
        db.upsert_effort(&effort).unwrap();
        db.upsert_effort(&effort).unwrap();

        assert_eq!(db.get_segment(101).unwrap(), Some(detail));
    }

    #[test]
    fn test_failed_segment_upsert_leaves_nothing() {
        let mut db = open_test_db();
        let mut effort = make_effort(1, make_athlete(7, Gender::Male), 600);
        // Violates CHECK (distance >= 0).
        effort.segment.distance = -1.0;

        assert!(db.upsert_effort(&effort).is_err());
        assert_eq!(db.get_effort(1).unwrap(), None);
        assert_eq!(db.get_segment(101).unwrap(), None);
        assert_eq!(db.get_athlete(7).unwrap(), None);
    }

    #[test]
    fn test_failed_effort_row_rolls_back_segment_and_athlete() {
        let mut db = open_test_db();
        // Violates CHECK (elapsed_time >= 0) after segment and athlete were written.
        let effort = make_effort(1, make_athlete(7, Gender::Male), -5);

        assert!(db.upsert_effort(&effort).is_err());
        assert_eq!(db.counts().unwrap(), CacheCounts::default());
    }

    #[test]
    fn test_failed_update_keeps_previous_triple() {
        let mut db = open_test_db();
        let original = make_effort(1, make_athlete(7, Gender::Male), 600);
        db.upsert_effort(&original).unwrap();

        let mut broken = make_effort(1, make_athlete(7, Gender::Female), 590);
        broken.segment.distance = -1.0;
        assert!(db.upsert_effort(&broken).is_err());

        assert_eq!(db.get_effort_detail(1).unwrap(), Some(original));
    }

    #[test]
    fn test_effort_requires_existing_parents() {
        let db = open_test_db();
        let result = db.conn().execute(
            "INSERT INTO efforts (id, segment_id, athlete_id, activity_id, elapsed_time, start_date)
             VALUES (1, 999, 998, 1, 600, '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_upsert_efforts_batch() {
        let mut db = open_test_db();
        let efforts = vec![
            make_effort(1, make_athlete(7, Gender::Male), 600),
            make_effort(2, make_athlete(8, Gender::Male), 610),
            make_effort(3, make_athlete(7, Gender::Male), 590),
        ];
        assert_eq!(db.upsert_efforts(&efforts).unwrap(), 3);
        let counts = db.counts().unwrap();
        assert_eq!(counts.efforts, 3);
        assert_eq!(counts.athletes, 2);
        assert_eq!(counts.segments, 1);
    }

    #[test]
    fn test_efforts_for_segment_filters() {
        let mut db = open_test_db();
        let mut last_year = make_effort(1, make_athlete(7, Gender::Male), 600);
        last_year.start_date = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let this_year = make_effort(2, make_athlete(8, Gender::Male), 610);
        let female = make_effort(3, make_athlete(9, Gender::Female), 700);
        let mut other_segment = make_effort(4, make_athlete(7, Gender::Male), 500);
        other_segment.segment = make_segment(202);
        db.upsert_efforts(&[last_year, this_year, female, other_segment])
            .unwrap();

        let all = db.efforts_for_segment(101, None, None).unwrap();
        assert_eq!(all.len(), 3);

        let male = db.efforts_for_segment(101, Some(Gender::Male), None).unwrap();
        let mut ids: Vec<i64> = male.iter().map(|e| e.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);

        let range = DateRange::year(2024).unwrap();
        let male_2024 = db
            .efforts_for_segment(101, Some(Gender::Male), Some(&range))
            .unwrap();
        assert_eq!(male_2024.len(), 1);
        assert_eq!(male_2024[0].id, 2);
    }
}
