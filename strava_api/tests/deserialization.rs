use strava_api::types::{Gender, SegmentDetail, SegmentEffort};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

#[test]
fn deserialize_segment_detail() {
    let json = load_fixture("segment.json");
    let segment: SegmentDetail = serde_json::from_str(&json).unwrap();
    assert_eq!(segment.id, 8109834);
    assert_eq!(segment.name, "Old La Honda (Bridge to Mailboxes)");
    assert_eq!(segment.distance, 4880.4);
    assert_eq!(segment.total_elevation_gain, 386.2);
    assert_eq!(segment.elevation_high, 515.2);
    assert_eq!(segment.elevation_low, 129.0);
}

#[test]
fn deserialize_efforts_full() {
    let json = load_fixture("efforts.json");
    let efforts: Vec<SegmentEffort> = serde_json::from_str(&json).unwrap();
    assert_eq!(efforts.len(), 2);

    let first = &efforts[0];
    assert_eq!(first.id, 2920055998);
    assert_eq!(first.elapsed_time, 990);
    assert_eq!(first.activity.id, 817123456);
    assert_eq!(first.athlete.id, 648204);
    assert_eq!(first.athlete.sex, Some(Gender::Male));
    assert_eq!(first.athlete.display_name(), "Alex S.");
    assert_eq!(first.segment.id, 8109834);
    assert_eq!(first.start_date.to_rfc3339(), "2017-01-01T16:02:11+00:00");
}

#[test]
fn deserialize_effort_with_hidden_athlete() {
    let json = load_fixture("efforts.json");
    let efforts: Vec<SegmentEffort> = serde_json::from_str(&json).unwrap();

    let second = &efforts[1];
    assert_eq!(second.athlete.sex, None);
    assert_eq!(second.athlete.firstname, None);
    assert_eq!(second.athlete.display_name(), "Athlete 112233");
    // Embedded segment summaries may omit elevation fields.
    assert_eq!(second.segment.total_elevation_gain, 0.0);
}

#[test]
fn deserialize_efforts_empty() {
    let json = load_fixture("efforts_empty.json");
    let efforts: Vec<SegmentEffort> = serde_json::from_str(&json).unwrap();
    assert!(efforts.is_empty());
}
