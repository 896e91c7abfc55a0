//! Integration tests for `HttpPageSource` and `MediaClient`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made.

use std::time::Duration;

use pagescope_scraper::{
    extract_profile, HttpPageSource, Locator, MediaClient, PageSource, ScraperError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACME: &str = include_str!("fixtures/acme.html");

fn test_source(base: &str) -> HttpPageSource {
    HttpPageSource::new(base, 5, "pagescope-test/0.1", 0, 0).expect("failed to build test source")
}

fn test_source_with_retries(base: &str, max_retries: u32) -> HttpPageSource {
    HttpPageSource::new(base, 5, "pagescope-test/0.1", max_retries, 0)
        .expect("failed to build test source")
}

// ---------------------------------------------------------------------------
// HttpPageSource
// ---------------------------------------------------------------------------

#[tokio::test]
async fn render_fetches_identifier_path_and_exposes_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ACME))
        .expect(1)
        .mount(&server)
        .await;

    let page = test_source(&server.uri())
        .render("acme")
        .await
        .expect("render should succeed");

    assert_eq!(page.current_url(), format!("{}/acme", server.uri()));
    let name = page
        .wait_for_text(&Locator::parse("h1").unwrap(), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(name, "Acme Inc");

    let profile = extract_profile(page.as_ref(), "acme", Duration::from_secs(1)).await;
    assert_eq!(profile.followers_count, 5000);
}

#[tokio::test]
async fn render_maps_404_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = test_source(&server.uri()).render("ghost").await;

    match result {
        Err(err) => assert!(err.is_not_found(), "expected NotFound, got {err:?}"),
        Ok(_) => panic!("expected NotFound"),
    }
}

#[tokio::test]
async fn render_maps_403_to_unexpected_status_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let result = test_source_with_retries(&server.uri(), 3).render("acme").await;

    assert!(matches!(
        result,
        Err(ScraperError::UnexpectedStatus { status: 403, .. })
    ));
}

#[tokio::test]
async fn render_retries_rate_limit_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Acme Inc</h1>"))
        .mount(&server)
        .await;

    let result = test_source_with_retries(&server.uri(), 2).render("acme").await;

    assert!(result.is_ok(), "expected success after one 429");
}

#[tokio::test]
async fn render_gives_up_after_exhausting_retries_on_5xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let result = test_source_with_retries(&server.uri(), 2).render("acme").await;

    assert!(matches!(
        result,
        Err(ScraperError::UnexpectedStatus { status: 502, .. })
    ));
}

#[tokio::test]
async fn render_rejects_invalid_identifier_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = test_source(&server.uri()).render("../etc").await;

    assert!(matches!(
        result,
        Err(ScraperError::InvalidIdentifier { .. })
    ));
}

// ---------------------------------------------------------------------------
// MediaClient
// ---------------------------------------------------------------------------

#[tokio::test]
async fn media_fetch_returns_bytes_and_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
        )
        .mount(&server)
        .await;

    let client = MediaClient::new(5, "pagescope-test/0.1", 0, 0).unwrap();
    let media = client
        .fetch(&format!("{}/a.jpg", server.uri()))
        .await
        .expect("fetch should succeed");

    assert_eq!(media.bytes.as_ref(), &[0xFF, 0xD8, 0xFF]);
    assert_eq!(media.content_type.as_deref(), Some("image/jpeg"));
}

#[tokio::test]
async fn media_fetch_maps_missing_asset_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.jpg"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let client = MediaClient::new(5, "pagescope-test/0.1", 2, 0).unwrap();
    let result = client.fetch(&format!("{}/gone.jpg", server.uri())).await;

    assert!(matches!(result, Err(ScraperError::NotFound { .. })));
}
