use super::*;

fn source(base: &str) -> HttpPageSource {
    HttpPageSource::new(base, 5, "pagescope-test/0.1", 0, 0).expect("client builds")
}

#[test]
fn page_url_joins_base_and_identifier() {
    let url = source("https://www.facebook.com").page_url("acme").unwrap();
    assert_eq!(url, "https://www.facebook.com/acme");
}

#[test]
fn page_url_strips_trailing_slash_from_base() {
    let url = source("https://www.facebook.com/").page_url("acme.inc").unwrap();
    assert_eq!(url, "https://www.facebook.com/acme.inc");
}

#[test]
fn page_url_rejects_path_injection() {
    let err = source("https://www.facebook.com")
        .page_url("acme/../admin")
        .unwrap_err();
    assert!(matches!(err, ScraperError::InvalidIdentifier { .. }));
}

#[test]
fn extract_domain_returns_host() {
    assert_eq!(
        extract_domain("https://scontent.example.net/v/a.jpg?x=1"),
        "scontent.example.net"
    );
    assert_eq!(extract_domain("not a url"), "not a url");
}
