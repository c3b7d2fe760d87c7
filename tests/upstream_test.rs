//! Integration tests for [`RapidApiChartClient`] against a mock provider.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chartkeep::upstream::{ChartSource, RapidApiChartClient};
use chartkeep::{ChartkeepError, EntryLayout};

fn chart_body(date: &str) -> serde_json::Value {
    json!({
        "chart": {
            "date": date,
            "title": "Billboard Hot 100",
            "entries": [
                {"rank": 1, "title": "Last Night", "artist": "Morgan Wallen", "weeks": 10},
                {"rank": 2, "title": "Flowers", "artist": "Miley Cyrus", "peak": 1}
            ]
        }
    })
}

#[tokio::test]
async fn current_chart_omits_week() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chart.php"))
        .and(query_param("id", "hot-100"))
        .and(query_param_is_missing("week"))
        .and(header("X-RapidAPI-Key", "test-key"))
        .and(header("X-RapidAPI-Host", "billboard-charts-api.p.rapidapi.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body("2023-04-08")))
        .expect(1)
        .mount(&server)
        .await;

    let client = RapidApiChartClient::with_base_url("test-key", server.uri()).unwrap();
    let snapshot = client.fetch_chart("hot-100", None).await.unwrap();

    assert_eq!(snapshot.layout, EntryLayout::ChartEntries);
    assert_eq!(snapshot.as_of_date.as_deref(), Some("2023-04-08"));
    assert_eq!(snapshot.entries.len(), 2);
    assert_eq!(snapshot.entries[0].title, "Last Night");
    assert_eq!(snapshot.entries[0].weeks, Some(10));
    assert!(!snapshot.is_historical());
}

#[tokio::test]
async fn historical_chart_sends_week() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chart.php"))
        .and(query_param("id", "billboard-200"))
        .and(query_param("week", "2022-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "date": "2022-01-01",
            "songs": [{"name": "Easy On Me", "artist": "Adele", "rank": 1}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RapidApiChartClient::with_base_url("test-key", server.uri()).unwrap();
    let snapshot = client
        .fetch_chart("billboard-200", Some("2022-01-01"))
        .await
        .unwrap();

    assert_eq!(snapshot.layout, EntryLayout::Songs);
    assert_eq!(snapshot.week.as_deref(), Some("2022-01-01"));
    assert_eq!(snapshot.entries[0].title, "Easy On Me");
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chart.php"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "30")
                .set_body_json(json!({"message": "Too many requests"})),
        )
        .mount(&server)
        .await;

    let client = RapidApiChartClient::with_base_url("test-key", server.uri()).unwrap();
    let err = client.fetch_chart("hot-100", None).await.unwrap_err();

    match err {
        ChartkeepError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Some(Duration::from_secs(30)));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chart.php"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = RapidApiChartClient::with_base_url("test-key", server.uri()).unwrap();
    let err = client.fetch_chart("hot-100", None).await.unwrap_err();

    assert_eq!(err.status_code(), Some(502));
    assert!(!err.is_rate_limited());
}

#[tokio::test]
async fn error_envelope_is_a_payload_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chart.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "You are not subscribed to this API."})),
        )
        .mount(&server)
        .await;

    let client = RapidApiChartClient::with_base_url("test-key", server.uri()).unwrap();
    let err = client.fetch_chart("hot-100", None).await.unwrap_err();

    assert!(matches!(err, ChartkeepError::Payload(_)), "got {err:?}");
    assert!(err.to_string().contains("not subscribed"));
}

#[tokio::test]
async fn non_json_body_is_a_payload_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chart.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = RapidApiChartClient::with_base_url("test-key", server.uri()).unwrap();
    let err = client.fetch_chart("hot-100", None).await.unwrap_err();
    assert!(matches!(err, ChartkeepError::Payload(_)), "got {err:?}");
}

#[tokio::test]
async fn connection_failure_is_a_transport_error() {
    // Nothing listens on the discard port.
    let client = RapidApiChartClient::with_base_url("test-key", "http://127.0.0.1:9").unwrap();
    let err = client.fetch_chart("hot-100", None).await.unwrap_err();

    assert!(matches!(err, ChartkeepError::Http(_)), "got {err:?}");
    assert_eq!(err.status_code(), None);
    assert!(err.is_upstream());
}
