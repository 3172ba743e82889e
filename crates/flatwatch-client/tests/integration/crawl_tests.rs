use std::time::Duration;

use flatwatch_client::{HtmlTextCleaner, ReqwestFetcher};
use flatwatch_core::testutil::MockReporter;
use flatwatch_core::{
    CrawlConfig, CrawlErrorKind, Ledger, RetryPolicy, SiteCrawler, SiteDescriptor,
};

use crate::common::spawn_fixture_server;

fn crawler() -> SiteCrawler<ReqwestFetcher, HtmlTextCleaner> {
    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(5)).unwrap();
    let config = CrawlConfig::default().with_retry(RetryPolicy::new(1, Duration::ZERO));
    SiteCrawler::new(fetcher, HtmlTextCleaner::new(), config)
}

fn listing_site(base: &str, path: &str) -> SiteDescriptor {
    SiteDescriptor::new("Fixture", format!("{base}{path}"))
        .with_empty_marker("keine passenden Angebote")
        .with_success_marker("Seite 1 von")
        .with_link_pattern(r#"href="(/offer/\d+)""#)
}

#[tokio::test]
async fn crawl_listing_with_details_and_persisted_ledger() {
    let base = spawn_fixture_server().await;
    let dir = tempfile::tempdir().unwrap();
    let known = dir.path().join("known.txt");
    let site = listing_site(&base, "/list")
        .with_detail("title", r#"<h1 class="title">(.+?)</h1>"#)
        .with_detail("rooms", r"<dt>Zimmer:</dt><dd>(\d+)</dd>")
        .with_detail("total_rent", r"<dt>Warmmiete:</dt><dd>(.+?)</dd>")
        .with_detail("floor", r"<dt>Etage:</dt><dd>(.+?)</dd>");

    let mut ledger = Ledger::open(&known).await.unwrap();
    let result = crawler().check(&site, &mut ledger, &MockReporter::new()).await;

    assert!(result.is_ok(), "unexpected error: {:?}", result.error);
    assert_eq!(result.offers.len(), 2);
    let first = &result.offers[0];
    assert_eq!(first.url, format!("{base}/offer/101"));
    assert_eq!(first.title(), Some("Wohnung 101"));
    let details = first.details.as_ref().unwrap();
    assert_eq!(details.get("rooms"), Some("1"));
    assert_eq!(details.get("total_rent"), Some("801 €"));
    assert!(details.get("floor").is_none());

    let stored = std::fs::read_to_string(&known).unwrap();
    assert_eq!(
        stored,
        format!("{base}/offer/101\n{base}/offer/102\n")
    );

    let mut reopened = Ledger::open(&known).await.unwrap();
    let again = crawler().check(&site, &mut reopened, &MockReporter::new()).await;
    assert!(again.is_ok());
    assert!(again.offers.is_empty());
}

#[tokio::test]
async fn empty_listing_is_not_an_error() {
    let base = spawn_fixture_server().await;
    let result = crawler()
        .check(
            &listing_site(&base, "/empty"),
            &mut Ledger::in_memory(),
            &MockReporter::new(),
        )
        .await;
    assert!(result.is_ok());
    assert!(result.offers.is_empty());
}

#[tokio::test]
async fn server_error_becomes_not_found_after_retries() {
    let base = spawn_fixture_server().await;
    let reporter = MockReporter::new();
    let result = crawler()
        .check(
            &listing_site(&base, "/broken"),
            &mut Ledger::in_memory(),
            &reporter,
        )
        .await;

    let error = result.error.unwrap();
    assert_eq!(error.kind(), CrawlErrorKind::NotFound);
    assert!(error.to_string().contains("500"));
    assert_eq!(
        reporter.labels(),
        vec!["Crawling", "Retrying", "Crawling", "GaveUp"]
    );
}

#[tokio::test]
async fn browser_user_agent_gets_past_ua_filter() {
    let base = spawn_fixture_server().await;
    let result = crawler()
        .check(
            &listing_site(&base, "/browser-only"),
            &mut Ledger::in_memory(),
            &MockReporter::new(),
        )
        .await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);
    assert_eq!(result.offers.len(), 2);
}

#[tokio::test]
async fn static_page_is_fingerprinted_by_visible_text() {
    let base = spawn_fixture_server().await;
    let url = format!("{base}/static");
    let site = SiteDescriptor::new("Static", url.clone());
    let mut ledger = Ledger::in_memory();

    let first = crawler().check(&site, &mut ledger, &MockReporter::new()).await;
    assert_eq!(first.offers.len(), 1);
    assert_eq!(first.offers[0].url, url);
    assert!(ledger.contains(&format!("{url}|")));

    let second = crawler().check(&site, &mut ledger, &MockReporter::new()).await;
    assert!(second.offers.is_empty());
}

#[tokio::test]
async fn unreachable_site_is_connection_error() {
    let site = listing_site("http://127.0.0.1:9", "/list");
    let result = crawler()
        .check(&site, &mut Ledger::in_memory(), &MockReporter::new())
        .await;
    assert_eq!(result.error.unwrap().kind(), CrawlErrorKind::Connection);
}
