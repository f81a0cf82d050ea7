//! HttpFetcher and FetchExecutor against a real local HTTP server.

use std::sync::Arc;
use std::time::Duration;

use mockito::Server;
use sitecrawler::error::FetchErrorKind;
use sitecrawler::models::CrawlerConfig;
use sitecrawler::services::{BoundedExecutor, FetchExecutor, HttpFetcher, PageFetcher, RetryPolicy};

fn fetcher(expect_html: bool) -> HttpFetcher {
    let config = CrawlerConfig {
        timeout_secs: 5,
        expect_html,
        ..CrawlerConfig::default()
    };
    HttpFetcher::new(&config).unwrap()
}

#[tokio::test]
async fn test_html_page_is_fetched() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/docs")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body("<html><body>docs</body></html>")
        .create_async()
        .await;

    let url = format!("{}/docs", server.url());
    let page = fetcher(true).fetch(&url).await.unwrap();

    assert_eq!(page.status_code, 200);
    assert_eq!(page.final_url, url);
    assert!(page.is_html());
    assert!(page.body.contains("docs"));
}

#[tokio::test]
async fn test_redirect_reports_final_url() {
    let mut server = Server::new_async().await;
    let _old = server
        .mock("GET", "/old")
        .with_status(301)
        .with_header("location", "/new")
        .create_async()
        .await;
    let _new = server
        .mock("GET", "/new")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<p>moved</p>")
        .create_async()
        .await;

    let page = fetcher(true)
        .fetch(&format!("{}/old", server.url()))
        .await
        .unwrap();
    assert_eq!(page.final_url, format!("{}/new", server.url()));
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("Not Found")
        .create_async()
        .await;

    let err = fetcher(true)
        .fetch(&format!("{}/missing", server.url()))
        .await
        .unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(err.kind(), FetchErrorKind::ClientError);
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_server_error_and_rate_limit_are_transient() {
    let mut server = Server::new_async().await;
    let _down = server
        .mock("GET", "/down")
        .with_status(503)
        .create_async()
        .await;
    let _busy = server
        .mock("GET", "/busy")
        .with_status(429)
        .create_async()
        .await;

    let f = fetcher(true);
    let down = f.fetch(&format!("{}/down", server.url())).await.unwrap_err();
    let busy = f.fetch(&format!("{}/busy", server.url())).await.unwrap_err();

    assert!(down.is_transient());
    assert_eq!(down.kind(), FetchErrorKind::ServerError);
    assert!(busy.is_transient());
    assert_eq!(busy.kind(), FetchErrorKind::RateLimited);
}

#[tokio::test]
async fn test_non_html_is_permanent_when_html_expected() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/feed")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;
    let url = format!("{}/feed", server.url());

    let err = fetcher(true).fetch(&url).await.unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(err.kind(), FetchErrorKind::ContentType);

    let page = fetcher(false).fetch(&url).await.unwrap();
    assert_eq!(page.body, "{}");
}

#[tokio::test]
async fn test_malformed_url_is_permanent() {
    let err = fetcher(true).fetch("::not a url::").await.unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(err.kind(), FetchErrorKind::MalformedUrl);
}

#[tokio::test]
async fn test_executor_retries_server_errors() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/flaky")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let executor = FetchExecutor::new(
        Arc::new(fetcher(true)),
        BoundedExecutor::new(2),
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            jitter: Duration::ZERO,
            max_elapsed: Duration::from_secs(10),
        },
        Duration::from_secs(5),
    );

    let result = executor.fetch(&format!("{}/flaky", server.url())).await;
    assert_eq!(result.attempts, 3);
    assert!(result.error().unwrap().is_transient());
    mock.assert_async().await;
}
