use std::sync::Arc;
use std::time::Duration;

use climberrankings_lib::model::{DateRange, Gender};
use climberrankings_lib::provider::{LeaderboardProvider, StravaProvider};
use climberrankings_lib::retry::{RateLimiter, RetryConfig};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
    }
}

fn provider(server: &MockServer) -> StravaProvider {
    StravaProvider::with_base_url(&server.uri(), "test-token")
        .unwrap()
        .with_retry_config(fast_retry())
        .with_rate_limiter(Arc::new(RateLimiter::new(100, Duration::from_secs(60))))
}

fn segment_json() -> serde_json::Value {
    json!({
        "id": 101,
        "name": "Old La Honda",
        "distance": 4880.4,
        "total_elevation_gain": 386.2,
        "elevation_high": 515.2,
        "elevation_low": 129.0
    })
}

fn efforts_json() -> serde_json::Value {
    json!([
        {
            "id": 11,
            "elapsed_time": 600,
            "start_date": "2024-04-02T14:00:00Z",
            "activity": { "id": 901 },
            "athlete": { "id": 7, "firstname": "Kim", "lastname": "L.", "sex": "F" },
            "segment": segment_json()
        },
        {
            "id": 12,
            "elapsed_time": 590,
            "start_date": "2024-05-20T07:30:00Z",
            "activity": { "id": 902 },
            "athlete": { "id": 8 },
            "segment": segment_json()
        }
    ])
}

#[tokio::test]
async fn list_efforts_sends_facet_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/segments/101/all_efforts"))
        .and(query_param("gender", "F"))
        .and(query_param("per_page", "200"))
        .and(query_param("start_date_local", "2024-01-01T00:00:00Z"))
        .and(query_param("end_date_local", "2024-12-31T23:59:59Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(efforts_json()))
        .expect(1)
        .mount(&server)
        .await;

    let efforts = provider(&server)
        .list_efforts(101, Gender::Female, DateRange::year(2024), 200)
        .await
        .unwrap();

    assert_eq!(efforts.len(), 2);
    assert_eq!(efforts[0].athlete.name, "Kim L.");
    // Hidden sex inherits the filtered gender.
    assert_eq!(efforts[1].athlete.gender, Gender::Female);
    assert_eq!(efforts[1].athlete.name, "Athlete 8");
    assert_eq!(efforts[1].segment.id, 101);
}

#[tokio::test]
async fn list_efforts_truncates_to_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/segments/101/all_efforts"))
        .and(query_param("per_page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(efforts_json()))
        .mount(&server)
        .await;

    let efforts = provider(&server)
        .list_efforts(101, Gender::Male, None, 1)
        .await
        .unwrap();
    assert_eq!(efforts.len(), 1);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/segments/101"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream busy"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/segments/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(segment_json()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let segment = provider.get_segment(101).await.unwrap();
    assert_eq!(segment.name, "Old La Honda");

    let summary = provider.request_summary();
    assert_eq!(summary.requests_made, 3);
    assert_eq!(summary.requests_retried, 2);
}

#[tokio::test]
async fn retries_stop_at_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/segments/101/all_efforts"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let err = provider(&server)
        .list_efforts(101, Gender::Male, None, 200)
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/segments/101/all_efforts"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server)
        .list_efforts(101, Gender::Male, None, 200)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn segment_details_are_memoized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/segments/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(segment_json()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let first = provider.get_segment(101).await.unwrap();
    let second = provider.get_segment(101).await.unwrap();
    assert_eq!(first, second);
}
