mod common;

use std::time::Duration;

use linkpeek_client::{FetchClient, FetchConfig, Fetcher};
use linkpeek_core::Error;
use reqwest::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{route}", server.uri())).unwrap()
}

#[tokio::test]
async fn sends_no_cache_headers_and_referer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("cache-control", "no-cache"))
        .and(header("pragma", "no-cache"))
        .and(header("referer", "https://blog.test/"))
        .and(header("user-agent", "linkpeek-test"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let config = FetchConfig {
        user_agent: "linkpeek-test".into(),
        referer: Some("https://blog.test/".into()),
        ..Default::default()
    };
    let client = FetchClient::new(config).unwrap();
    let response = client.fetch(&url(&server, "/page")).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.text(), "<html>ok</html>");
    assert!(response.content_type.unwrap().starts_with("text/html"));
    assert!(!response.truncated);
}

#[tokio::test]
async fn error_status_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410).set_body_string("gone"))
        .mount(&server)
        .await;

    let client = FetchClient::new(FetchConfig::default()).unwrap();
    let response = client.fetch(&url(&server, "/gone")).await.unwrap();
    assert_eq!(response.status.as_u16(), 410);
}

#[tokio::test]
async fn body_truncated_at_max_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let client = FetchClient::new(FetchConfig { max_bytes: 100, ..Default::default() }).unwrap();
    let response = client.fetch(&url(&server, "/big")).await.unwrap();
    assert_eq!(response.bytes.len(), 100);
    assert!(response.truncated);
}

#[tokio::test]
async fn follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;

    let client = FetchClient::new(FetchConfig::default()).unwrap();
    let response = client.fetch(&url(&server, "/old")).await.unwrap();
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.final_url.path(), "/new");
    assert_eq!(response.url.path(), "/old");
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = FetchConfig { timeout: Duration::from_millis(200), ..Default::default() };
    let client = FetchClient::new(config).unwrap();
    let result = client.fetch(&url(&server, "/slow")).await;
    assert!(matches!(result, Err(Error::FetchTimeout(_))), "got {result:?}");
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = FetchClient::new(FetchConfig::default()).unwrap();
    let result = client.fetch(&Url::parse(&format!("http://{addr}/")).unwrap()).await;
    assert!(matches!(result, Err(Error::Transport(_))), "got {result:?}");
}

#[tokio::test]
async fn body_cut_short_keeps_status() {
    let addr = common::short_body_server("HTTP/1.1 503 Service Unavailable");

    let client = FetchClient::new(FetchConfig::default()).unwrap();
    let response = client.fetch(&Url::parse(&format!("http://{addr}/flaky")).unwrap()).await.unwrap();

    assert_eq!(response.status.as_u16(), 503);
    assert!(response.truncated);
    assert!(b"<html>partial".starts_with(&response.bytes));
}
