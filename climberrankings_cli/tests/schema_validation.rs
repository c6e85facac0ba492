use chrono::{TimeZone, Utc};
use climberrankings_lib::{
    rank_efforts, Athlete, Climb, ClimbPage, Effort, Facet, Gender, JsonSiteRenderer,
    Leaderboards, PageRenderer, PathRegistry, Segment, SegmentSummary,
};
use serde_json::Value;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("CLI crate should be inside workspace")
        .to_path_buf()
}

fn load_schema(name: &str) -> Value {
    let path = workspace_root().join("schema").join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("read schema {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("schema is valid JSON")
}

fn load_output(path: &Path) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("read output {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("output is valid JSON")
}

fn segment() -> Segment {
    Segment {
        id: 101,
        name: "Old La Honda".to_string(),
        distance: 4880.4,
        total_elevation_gain: 386.2,
        elevation_high: 515.2,
        elevation_low: 129.0,
    }
}

fn effort(id: i64, gender: Gender, elapsed: i64) -> Effort {
    Effort {
        id,
        segment: segment(),
        athlete: Athlete {
            id: id + 1000,
            name: format!("Rider {}", id),
            gender,
        },
        activity_id: id * 10,
        elapsed_time: elapsed,
        start_date: Utc.with_ymd_and_hms(2024, 3, 9, 15, 30, 0).unwrap(),
    }
}

/// Renders the Old La Honda page into a temp dir.
fn render_sample() -> tempfile::TempDir {
    let climb = Climb::new("Old La Honda", &["OLH"], 101);
    let [mo, fo, my, fy] = Facet::all(2024);
    let leaderboards = Leaderboards {
        male_overall: rank_efforts(
            101,
            mo,
            vec![
                effort(1, Gender::Male, 590),
                effort(2, Gender::Male, 600),
                effort(3, Gender::Male, 590),
            ],
        ),
        female_overall: rank_efforts(101, fo, vec![effort(4, Gender::Female, 3725)]),
        male_yearly: rank_efforts(101, my, vec![effort(1, Gender::Male, 590)]),
        female_yearly: rank_efforts(101, fy, Vec::new()),
    };
    let paths = PathRegistry::resolve_all(std::slice::from_ref(&climb), 2024)
        .unwrap()
        .remove(0);
    let page = ClimbPage {
        climb,
        segment: SegmentSummary::from(&segment()),
        leaderboards,
        paths,
    };

    let dir = tempfile::tempdir().unwrap();
    JsonSiteRenderer::new(dir.path()).render(&page).unwrap();
    dir
}

// ---------------------------------------------------------------------------
// Positive validation: renderer output conforms to the schemas
// ---------------------------------------------------------------------------

#[test]
fn test_leaderboard_pages_conform_to_schema() {
    let dir = render_sample();
    let schema = load_schema("leaderboard.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("leaderboard schema compiles");

    for facet in Facet::all(2024) {
        let path = dir
            .path()
            .join("old-la-honda")
            .join(facet.slug())
            .join("leaderboard.json");
        let page = load_output(&path);
        if let Err(e) = validator.validate(&page) {
            panic!("{} failed validation: {e}", path.display());
        }
    }
}

#[test]
fn test_redirects_conform_to_schema() {
    let dir = render_sample();
    let schema = load_schema("redirects.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("redirects schema compiles");

    let redirects = load_output(&dir.path().join("old-la-honda/redirects.json"));
    if let Err(e) = validator.validate(&redirects) {
        panic!("redirects failed validation: {e}");
    }
    assert_eq!(redirects["redirects"].as_array().unwrap().len(), 4);
}

// ---------------------------------------------------------------------------
// Negative validation: schemas reject invalid data
// ---------------------------------------------------------------------------

#[test]
fn test_leaderboard_schema_rejects_zero_rank() {
    let dir = render_sample();
    let schema = load_schema("leaderboard.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("leaderboard schema compiles");

    let mut page = load_output(&dir.path().join("old-la-honda/top-male-riders/leaderboard.json"));
    page["entries"][0]["rank"] = Value::from(0);
    assert!(!validator.is_valid(&page));
}

#[test]
fn test_leaderboard_schema_rejects_missing_entries() {
    let dir = render_sample();
    let schema = load_schema("leaderboard.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("leaderboard schema compiles");

    let mut page = load_output(&dir.path().join("old-la-honda/top-male-riders/leaderboard.json"));
    page.as_object_mut().unwrap().remove("entries");
    assert!(!validator.is_valid(&page));
}

#[test]
fn test_leaderboard_schema_rejects_unknown_gender() {
    let dir = render_sample();
    let schema = load_schema("leaderboard.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("leaderboard schema compiles");

    let mut page = load_output(&dir.path().join("old-la-honda/top-male-riders/leaderboard.json"));
    page["facet"]["gender"] = Value::from("X");
    assert!(!validator.is_valid(&page));
}

#[test]
fn test_ranks_are_dense_in_output() {
    let dir = render_sample();
    let page = load_output(&dir.path().join("old-la-honda/top-male-riders/leaderboard.json"));
    let ranks: Vec<i64> = page["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["rank"].as_i64().unwrap())
        .collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    let first_ids: Vec<i64> = page["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["effort_id"].as_i64().unwrap())
        .collect();
    // Equal 590s with equal starts fall back to the lower athlete id.
    assert_eq!(first_ids, vec![1, 3, 2]);
}
