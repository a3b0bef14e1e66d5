//! Integration tests using wiremock to exercise the reqwest transport end to end.

use breakwater::{
    CircuitBreaker, CircuitState, Client, Endpoint, Error, Request, RetryPolicy,
    TransportErrorKind,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Station {
    id: u32,
    name: String,
}

fn station() -> Station {
    Station {
        id: 7,
        name: "Blindern".to_string(),
    }
}

fn fast_client() -> Client {
    Client::builder()
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(10)))
        .build()
        .unwrap()
}

fn endpoint_of(server: &MockServer) -> Endpoint {
    Endpoint::new(server.address().to_string())
}

/// Starts a raw TCP server that reads each request and answers with `reply`,
/// closing the connection afterwards. Returns the base URL and a hit counter.
async fn raw_server(reply: &'static [u8]) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(reply).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", address), hits)
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stations/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(station()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let response = client
        .send::<Station>(Request::get(format!("{}/stations/7", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(response.data, station());
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.endpoint, endpoint_of(&mock_server));
    assert!(response.raw_body.contains("Blindern"));
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/stations"))
        .and(header("content-type", "application/json"))
        .and(body_json(station()))
        .respond_with(ResponseTemplate::new(201).set_body_json(station()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let created: Station = client
        .post(format!("{}/stations", mock_server.uri()), &station())
        .await
        .unwrap();

    assert_eq!(created, station());
}

#[tokio::test]
async fn test_headers_and_query_parameters_forwarded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stations"))
        .and(query_param("near", "oslo"))
        .and(query_param("limit", "10"))
        .and(header("user-agent", "station-map/2.0"))
        .and(header("x-trace", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![station()]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .default_header("user-agent", "station-map/2.0")
        .unwrap()
        .build()
        .unwrap();

    let request = Request::get(format!("{}/stations", mock_server.uri()))
        .with_query_param("near", "oslo")
        .with_query_param("limit", "10")
        .with_header("x-trace", "abc123")
        .unwrap();

    let stations: Vec<Station> = client.execute(request).await.unwrap();
    assert_eq!(stations, vec![station()]);
}

#[tokio::test]
async fn test_http_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stations/404"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string("No such station")
                .insert_header("x-request-id", "r-1"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let result = client
        .get::<Station>(format!("{}/stations/404", mock_server.uri()))
        .await;

    match result {
        Err(Error::HttpError {
            status,
            raw_response,
            headers,
        }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(raw_response, "No such station");
            assert_eq!(headers["x-request-id"], "r-1");
        }
        other => panic!("Expected HttpError, got {:?}", other),
    }
    assert_eq!(
        client
            .circuit_breaker()
            .consecutive_failures(&endpoint_of(&mock_server)),
        1
    );
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Maintenance"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let result = client.get::<Station>(mock_server.uri()).await;

    assert_eq!(result.unwrap_err().raw_response(), Some("Maintenance"));
}

#[tokio::test]
async fn test_deserialization_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let result = client.get::<Station>(mock_server.uri()).await;

    match result {
        Err(Error::DecodingFailure {
            raw_response,
            serde_error,
            status,
        }) => {
            assert_eq!(status.as_u16(), 200);
            assert_eq!(raw_response, "invalid json");
            assert!(serde_error.contains("expected"));
        }
        other => panic!("Expected DecodingFailure, got {:?}", other),
    }
    assert_eq!(
        client
            .circuit_breaker()
            .consecutive_failures(&endpoint_of(&mock_server)),
        0
    );
}

#[tokio::test]
async fn test_empty_body_fails_to_decode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let result = client
        .delete::<serde_json::Value>(format!("{}/stations/7", mock_server.uri()))
        .await;

    assert_eq!(result.unwrap_err().status().map(|s| s.as_u16()), Some(204));
}

#[tokio::test]
async fn test_connection_refused_is_retried_then_surfaced() {
    // Reserve a port, then free it so nothing is listening there
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = fast_client();
    let result = client
        .get::<Station>(format!("http://127.0.0.1:{}/stations", port))
        .await;

    match result {
        Err(Error::NetworkFailure { error, attempts }) => {
            assert_eq!(error.kind(), TransportErrorKind::CannotConnectToHost);
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected NetworkFailure, got {:?}", other),
    }

    let endpoint = Endpoint::new(format!("127.0.0.1:{}", port));
    assert_eq!(client.circuit_breaker().consecutive_failures(&endpoint), 1);
}

#[tokio::test]
async fn test_timeout_is_classified_and_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(station())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .timeout(Duration::from_millis(50))
        .retry_policy(RetryPolicy::new(2, Duration::from_millis(10)))
        .build()
        .unwrap();

    let result = client.get::<Station>(mock_server.uri()).await;

    match result {
        Err(Error::NetworkFailure { error, attempts }) => {
            assert_eq!(error.kind(), TransportErrorKind::TimedOut);
            assert_eq!(attempts, 2);
        }
        other => panic!("Expected NetworkFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(5)
        .mount(&mock_server)
        .await;

    let breaker = Arc::new(CircuitBreaker::default());
    let client = Client::builder()
        .circuit_breaker(breaker.clone())
        .build()
        .unwrap();

    for _ in 0..5 {
        let result = client.get::<Station>(mock_server.uri()).await;
        assert!(matches!(result, Err(Error::HttpError { .. })));
    }

    // The sixth request never reaches the server
    let result = client.get::<Station>(mock_server.uri()).await;
    let err = result.unwrap_err();
    assert!(matches!(err, Error::CircuitBreakerOpen { .. }));
    assert_eq!(err.endpoint(), Some(&endpoint_of(&mock_server)));
    assert!(err.retry_after().unwrap() > Duration::from_secs(55));
    assert_eq!(breaker.state(&endpoint_of(&mock_server)), CircuitState::Open);
}

#[tokio::test]
async fn test_malformed_response_is_not_retried() {
    let (base_url, hits) = raw_server(b"NOT-HTTP garbage\r\n\r\n").await;

    let client = Client::builder()
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(5)))
        .build()
        .unwrap();
    let result = client.get::<Station>(format!("{}/stations", base_url)).await;

    match result {
        Err(Error::NetworkFailure { error, attempts }) => {
            assert_eq!(error.kind(), TransportErrorKind::Other);
            assert_eq!(attempts, 1);
        }
        other => panic!("Expected NetworkFailure, got {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_closed_without_response_is_retried() {
    let (base_url, _hits) = raw_server(b"").await;

    let client = Client::builder()
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(5)))
        .build()
        .unwrap();
    let result = client.get::<Station>(format!("{}/stations", base_url)).await;

    match result {
        Err(Error::NetworkFailure { error, attempts }) => {
            assert_eq!(error.kind(), TransportErrorKind::ConnectionLost);
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected NetworkFailure, got {:?}", other),
    }
}
