use agrotrack::client::ApiClient;
use agrotrack::config::{ApiConfig, RetryPolicy};
use agrotrack::error::AppError;
use agrotrack::weather::{ParcelSource, WeatherSource};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, retry: RetryPolicy) -> ApiClient {
    let config = ApiConfig {
        base_url: server.uri(),
        token: Some("secret".to_string()),
        timeout_seconds: 5,
    };
    ApiClient::new(&config, retry).expect("Failed to create client")
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_delay_ms: 10,
        max_delay_ms: 20,
    }
}

/// Weather lookups pass coordinates as query parameters and send the token
#[tokio::test]
async fn test_current_weather_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clima/actual"))
        .and(query_param("lat", "-12.0464"))
        .and(query_param("lon", "-77.0428"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "temperature": 36.5,
            "humidity": 40,
            "rainfallRate": 0.0,
            "hasExtremeConditions": true,
            "isExtremeTemperature": true,
            "isHeavyRain": false,
            "description": "Soleado y caluroso",
            "fetchedAt": "2025-07-13T15:00:00Z"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let snapshot = client(&mock_server, RetryPolicy::none())
        .current_weather(-12.0464, -77.0428)
        .await
        .expect("Weather lookup failed");

    assert_eq!(snapshot.temperature, 36.5);
    assert!(snapshot.is_extreme_temperature);
    assert_eq!(snapshot.alerts().len(), 1);
    assert_eq!(snapshot.fetched_at.to_rfc3339(), "2025-07-13T15:00:00+00:00");
}

/// Parcel listings may come wrapped in a data envelope
#[tokio::test]
async fn test_list_parcels_wrapped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/parcelas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"id": 1, "latitude": -12.0464, "longitude": -77.0428, "displayLocation": "Lima"},
                {"id": 2, "displayLocation": "Sin coordenadas"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let parcels = client(&mock_server, RetryPolicy::none())
        .list_parcels()
        .await
        .expect("Parcel listing failed");

    assert_eq!(parcels.len(), 2);
    assert_eq!(parcels[0].display_location, "Lima");
    assert!(parcels[1].latitude.is_none());
}

/// Server errors are retried until the request succeeds
#[tokio::test]
async fn test_retries_on_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/parcelas"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/parcelas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let parcels = client(&mock_server, fast_retry()).list_parcels().await;
    tokio_test::assert_ok!(parcels);
}

/// Client errors are returned immediately without retrying
#[tokio::test]
async fn test_does_not_retry_client_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clima/actual"))
        .respond_with(ResponseTemplate::new(404).set_body_string("sin datos"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = client(&mock_server, fast_retry())
        .current_weather(-13.5, -71.9)
        .await;

    match result {
        Err(AppError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "sin datos");
        }
        other => panic!("Expected Api error, got: {:?}", other),
    }
}

/// Retries stop after the configured number of attempts
#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/parcelas"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&mock_server)
        .await;

    let result = client(&mock_server, fast_retry()).list_parcels().await;
    assert!(matches!(result, Err(AppError::Api { status: 503, .. })));
}
