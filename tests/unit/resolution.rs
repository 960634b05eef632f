//! Entity resolution fallback chain against a scripted upstream

use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::fixtures::{company_tickers, efts_no_hits, FAKE_BASE};
use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::FakeFetcher;
use data_actors::api::{Endpoints, Fetcher};
use data_actors::error::ScraperError;
use data_actors::scrapers::{EntityQuery, EntityResolver, ResolutionStrategy, TickerCache};

const TICKERS: &str = "/files/company_tickers.json";
const SEARCH: &str = "/LATEST/search-index";

fn resolver(fetcher: &Arc<FakeFetcher>) -> (EntityResolver, Arc<TickerCache>) {
    let endpoints = Endpoints::with_base(FAKE_BASE);
    let shared: Arc<dyn Fetcher> = fetcher.clone();
    let cache = Arc::new(TickerCache::new(shared.clone(), endpoints.sec_tickers.clone()));
    let resolver = EntityResolver::new(shared, cache.clone(), endpoints.sec_full_text_search);
    (resolver, cache)
}

fn query(cik: Option<&str>, ticker: Option<&str>, text: Option<&str>) -> EntityQuery {
    EntityQuery {
        cik: cik.map(str::to_string),
        ticker: ticker.map(str::to_string),
        query: text.map(str::to_string),
    }
}

#[tokio::test]
async fn test_explicit_cik_needs_no_requests() {
    init_test_logging();
    log_test_step("Explicit CIK short-circuits the chain");

    let fetcher = Arc::new(FakeFetcher::new().route(TICKERS, company_tickers()));
    let (resolver, cache) = resolver(&fetcher);

    let entity = resolver
        .resolve(&query(Some("320193"), Some("MSFT"), Some("Microsoft")))
        .await
        .unwrap();

    assert_eq!(entity.cik, "0000320193");
    assert_eq!(entity.name, None);
    assert_eq!(entity.strategy, ResolutionStrategy::ExplicitCik);
    assert!(fetcher.requests().is_empty());
    assert!(!cache.is_loaded());
}

#[tokio::test]
async fn test_ticker_lookup_is_case_insensitive() {
    let fetcher = Arc::new(FakeFetcher::new().route(TICKERS, company_tickers()));
    let (resolver, _) = resolver(&fetcher);

    let entity = resolver.resolve(&query(None, Some("googl"), None)).await.unwrap();

    assert_eq!(entity.cik, "0001652044");
    assert_eq!(entity.name.as_deref(), Some("Alphabet Inc."));
    assert_eq!(entity.tickers, vec!["GOOGL", "GOOG"]);
    assert_eq!(entity.strategy, ResolutionStrategy::Ticker);
}

#[tokio::test]
async fn test_query_is_tried_as_ticker() {
    let fetcher = Arc::new(FakeFetcher::new().route(TICKERS, company_tickers()));
    let (resolver, _) = resolver(&fetcher);

    let entity = resolver.resolve(&query(None, None, Some("msft"))).await.unwrap();

    assert_eq!(entity.cik, "0000789019");
    assert_eq!(entity.strategy, ResolutionStrategy::QueryAsTicker);
    assert!(fetcher.requests_to(SEARCH).is_empty());
}

#[tokio::test]
async fn test_query_matches_company_name() {
    let fetcher = Arc::new(FakeFetcher::new().route(TICKERS, company_tickers()));
    let (resolver, _) = resolver(&fetcher);

    let entity = resolver.resolve(&query(None, None, Some("apple"))).await.unwrap();

    assert_eq!(entity.cik, "0000320193");
    assert_eq!(entity.name.as_deref(), Some("Apple Inc."));
    assert_eq!(entity.strategy, ResolutionStrategy::NameMatch);
}

#[tokio::test]
async fn test_unknown_ticker_falls_back_to_query() {
    let fetcher = Arc::new(FakeFetcher::new().route(TICKERS, company_tickers()));
    let (resolver, _) = resolver(&fetcher);

    let entity = resolver
        .resolve(&query(None, Some("ZZZZ"), Some("Microsoft")))
        .await
        .unwrap();

    assert_eq!(entity.cik, "0000789019");
    assert_eq!(entity.strategy, ResolutionStrategy::NameMatch);
}

#[tokio::test]
async fn test_full_text_search_is_last_resort() {
    init_test_logging();
    log_test_step("Name absent from the ticker table resolves via full-text search");

    let fetcher = Arc::new(
        FakeFetcher::new()
            .route(TICKERS, company_tickers())
            .route(
                SEARCH,
                json!({"hits": {"total": {"value": 12}, "hits": [{
                    "_id": "0001318605-24-000001:tsla-10k.htm",
                    "_source": {
                        "ciks": ["0001318605"],
                        "display_names": ["Tesla, Inc.  (TSLA)  (CIK 0001318605)"],
                        "form": "10-K"
                    }
                }]}}),
            ),
    );
    let (resolver, _) = resolver(&fetcher);

    let entity = resolver
        .resolve(&query(None, None, Some("Tesla Motors")))
        .await
        .unwrap();
    log_test_data("Resolved", &entity);

    assert_eq!(entity.cik, "0001318605");
    assert_eq!(entity.name.as_deref(), Some("Tesla, Inc."));
    assert_eq!(entity.tickers, vec!["TSLA"]);
    assert_eq!(entity.strategy, ResolutionStrategy::FullTextSearch);

    let searches = fetcher.requests_to(SEARCH);
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].query_value("q"), Some("\"Tesla Motors\""));
    assert_eq!(searches[0].query_value("size"), Some("1"));
}

#[tokio::test]
async fn test_nothing_found_is_entity_not_found() {
    let fetcher = Arc::new(
        FakeFetcher::new()
            .route(TICKERS, company_tickers())
            .route(SEARCH, efts_no_hits()),
    );
    let (resolver, _) = resolver(&fetcher);

    let err = resolver
        .resolve(&query(None, Some("NOPE"), Some("Nonexistent Holdings")))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ScraperError::EntityNotFound { cik: None, ticker: Some(ref t), query: Some(ref q) }
            if t == "NOPE" && q == "Nonexistent Holdings"
    );
}

#[tokio::test]
async fn test_empty_query_is_not_found_without_requests() {
    let fetcher = Arc::new(FakeFetcher::new().route(TICKERS, company_tickers()));
    let (resolver, cache) = resolver(&fetcher);

    let err = resolver.resolve(&query(None, None, Some("   "))).await.unwrap_err();

    assert_matches!(err, ScraperError::EntityNotFound { .. });
    assert!(fetcher.requests().is_empty());
    assert!(!cache.is_loaded());
}

#[tokio::test]
async fn test_ticker_table_fetched_once() {
    let fetcher = Arc::new(FakeFetcher::new().route(TICKERS, company_tickers()));
    let (resolver, cache) = resolver(&fetcher);

    for ticker in ["AAPL", "MSFT", "GOOG"] {
        resolver.resolve(&query(None, Some(ticker), None)).await.unwrap();
    }

    assert!(cache.is_loaded());
    assert_eq!(fetcher.requests_to(TICKERS).len(), 1);
}

#[tokio::test]
async fn test_failed_table_load_still_reaches_full_text_search() {
    let fetcher = Arc::new(
        FakeFetcher::new()
            .route_failure(TICKERS)
            .route(SEARCH, efts_no_hits()),
    );
    let (resolver, cache) = resolver(&fetcher);

    let first = resolver.resolve(&query(None, Some("AAPL"), Some("Apple"))).await;
    let second = resolver.resolve(&query(None, None, Some("Apple"))).await;

    assert!(first.is_err());
    assert!(second.is_err());
    assert!(cache.is_loaded());
    // The empty table is kept; the download is not retried
    assert_eq!(fetcher.requests_to(TICKERS).len(), 1);
    assert_eq!(fetcher.requests_to(SEARCH).len(), 2);
}
