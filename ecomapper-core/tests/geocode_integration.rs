//! Integration tests for NominatimSearch using wiremock.

use ecomapper_core::{Coordinate, GeocodeError, LocationSearch, NominatimSearch};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_first_result_is_used() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Reykjavik"))
        .and(query_param("format", "json"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "lat": "64.1466", "lon": "-21.9426", "display_name": "Reykjavík, Iceland" },
            { "lat": "0", "lon": "0" }
        ])))
        .mount(&mock_server)
        .await;

    let search = NominatimSearch::new(mock_server.uri()).unwrap();
    let coord = search.search("Reykjavik").await.unwrap();

    assert_eq!(coord, Some(Coordinate::new(64.1466, -21.9426)));
}

#[tokio::test]
async fn test_no_results_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let search = NominatimSearch::new(mock_server.uri()).unwrap();
    assert_eq!(search.search("nowhere at all").await.unwrap(), None);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let search = NominatimSearch::new(mock_server.uri()).unwrap();
    let err = search.search("Paris").await.unwrap_err();

    assert!(matches!(err, GeocodeError::Status(s) if s.as_u16() == 429));
}
