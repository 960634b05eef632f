//! End-to-end runs of the EDGAR actor against a scripted SEC

use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::fixtures::{
    apple_company_facts, apple_submissions, company_tickers, efts_hits, efts_no_hits, FAKE_BASE,
};
use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::{FakeFetcher, MemoryDataset, MemoryStore};
use data_actors::actor::{run_edgar, run_edgar_with, ActorRun, PlatformEnv, RunOutcome, RunSummary};
use data_actors::api::Endpoints;
use data_actors::models::EdgarConfig;

const TICKERS: &str = "/files/company_tickers.json";
const SEARCH: &str = "/LATEST/search-index";
const APPLE_SUBMISSIONS: &str = "/submissions/CIK0000320193.json";
const APPLE_FACTS: &str = "/companyfacts/CIK0000320193.json";

async fn run(input: Value, fetcher: &Arc<FakeFetcher>) -> (RunSummary, Vec<Value>) {
    let config = EdgarConfig::from_input(&input).expect("valid input");
    let dataset = Arc::new(MemoryDataset::new());
    let mut run = ActorRun::new(dataset.clone(), Arc::new(MemoryStore::new()), PlatformEnv::default());
    let outcome = run_edgar_with(&mut run, config, Endpoints::with_base(FAKE_BASE), fetcher.clone()).await;
    let summary = assert_matches!(outcome, RunOutcome::Completed(summary) => summary);
    (summary, dataset.items())
}

fn apple_sec() -> FakeFetcher {
    FakeFetcher::new()
        .route(TICKERS, company_tickers())
        .route(APPLE_SUBMISSIONS, apple_submissions())
        .route(APPLE_FACTS, apple_company_facts())
}

#[tokio::test]
async fn test_company_facts_namespace_concept_and_period_filters() {
    init_test_logging();
    log_test_step("Annual us-gaap Assets facts for an explicit CIK");

    let fetcher = Arc::new(apple_sec());
    let (summary, items) = run(
        json!({
            "mode": "company_facts",
            "cik": 320193,
            "namespace": "us-gaap",
            "concept": "assets",
            "periodType": "annual"
        }),
        &fetcher,
    )
    .await;

    assert_eq!(summary.scraped, 2);
    assert_eq!(items.len(), 2);
    log_test_data("First fact", &items[0]);
    assert_eq!(items[0]["type"], "fact");
    assert_eq!(items[0]["schema_version"], "1.0");
    assert_eq!(items[0]["cik"], "0000320193");
    assert_eq!(items[0]["entityName"], "Apple Inc.");
    assert_eq!(items[0]["namespace"], "us-gaap");
    assert_eq!(items[0]["concept"], "Assets");
    assert_eq!(items[0]["unit"], "USD");
    assert_eq!(items[0]["value"], json!(352755000000i64));
    assert_eq!(items[0]["frame"], "CY2022Q3I");
    assert_eq!(items[1]["end"], "2023-09-30");
    assert_eq!(items[1]["fiscalPeriod"], "FY");

    // An explicit CIK never touches the ticker table
    assert!(fetcher.requests_to(TICKERS).is_empty());
}

#[tokio::test]
async fn test_company_facts_namespace_only() {
    let fetcher = Arc::new(apple_sec());
    let (_, items) = run(json!({"mode": "company_facts", "ticker": "AAPL", "namespace": "dei"}), &fetcher).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["concept"], "EntityCommonStockSharesOutstanding");
    assert_eq!(items[0]["unit"], "shares");
    assert_eq!(items[0]["start"], Value::Null);
}

#[tokio::test]
async fn test_company_facts_stops_at_max_results() {
    let fetcher = Arc::new(apple_sec());
    let (summary, items) = run(json!({"mode": "company_facts", "cik": "320193", "maxResults": 2}), &fetcher).await;

    assert_eq!(summary.scraped, 2);
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn test_resolve_entity_via_ticker() {
    init_test_logging();
    log_test_step("Profile for a lower-case ticker");

    let fetcher = Arc::new(apple_sec());
    let (summary, items) = run(json!({"mode": "resolve_entity", "ticker": "aapl"}), &fetcher).await;

    assert_eq!(summary.scraped, 1);
    let entity = &items[0];
    assert_eq!(entity["type"], "entity");
    assert_eq!(entity["cik"], "0000320193");
    assert_eq!(entity["name"], "Apple Inc.");
    assert_eq!(entity["tickers"], json!(["AAPL"]));
    assert_eq!(entity["sicDescription"], "Electronic Computers");
    assert_eq!(entity["resolvedBy"], "ticker");
    assert_eq!(entity["recentFilings"][0]["form"], "10-Q");
    assert_eq!(entity["recentFilings"][0]["filingDate"], "2024-02-02");
    assert_eq!(
        entity["submissionsUrl"],
        format!("{}{}", FAKE_BASE, APPLE_SUBMISSIONS)
    );
}

#[tokio::test]
async fn test_resolve_entity_without_submissions_is_minimal() {
    let fetcher = Arc::new(
        FakeFetcher::new()
            .route(TICKERS, company_tickers())
            .route_failure(APPLE_SUBMISSIONS),
    );
    let (summary, items) = run(json!({"mode": "resolve_entity", "query": "Apple"}), &fetcher).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Apple Inc.");
    assert_eq!(items[0]["tickers"], json!(["AAPL"]));
    assert_eq!(items[0]["resolvedBy"], "name_match");
    assert_eq!(items[0]["recentFilings"], json!([]));
}

#[tokio::test]
async fn test_company_filings_drops_amendments_by_default() {
    let fetcher = Arc::new(apple_sec());
    let (_, items) = run(json!({"mode": "company_filings", "cik": "0000320193"}), &fetcher).await;

    let forms: Vec<&str> = items.iter().filter_map(|i| i["form"].as_str()).collect();
    assert_eq!(forms, vec!["10-Q", "10-K", "10-Q"]);
    assert_eq!(items[0]["source"], "submissions");
    assert_eq!(items[0]["entityName"], "Apple Inc.");
    assert_eq!(items[0]["accessionNumber"], "0000320193-24-000006");
    assert_eq!(items[0]["periodEnding"], "2023-12-30");
}

#[tokio::test]
async fn test_submission_tickers_are_upper_cased() {
    let mut submissions = apple_submissions();
    submissions["tickers"] = json!(["aapl"]);
    let fetcher = Arc::new(FakeFetcher::new().route(APPLE_SUBMISSIONS, submissions));

    let (_, filings) = run(json!({"mode": "company_filings", "cik": "320193"}), &fetcher).await;
    assert!(!filings.is_empty());
    assert!(filings.iter().all(|i| i["tickers"] == json!(["AAPL"])));

    let (_, entities) = run(json!({"mode": "resolve_entity", "cik": "320193"}), &fetcher).await;
    assert_eq!(entities[0]["tickers"], json!(["AAPL"]));
}

#[tokio::test]
async fn test_company_filings_form_and_date_filters() {
    let fetcher = Arc::new(apple_sec());

    let (_, annual) = run(
        json!({"mode": "company_filings", "cik": "320193", "forms": "10-K", "includeAmendments": true}),
        &fetcher,
    )
    .await;
    let forms: Vec<&str> = annual.iter().filter_map(|i| i["form"].as_str()).collect();
    assert_eq!(forms, vec!["10-K", "10-K/A"]);

    let (_, recent) = run(
        json!({"mode": "company_filings", "cik": "320193", "dateFrom": "2023-11-01"}),
        &fetcher,
    )
    .await;
    let dates: Vec<&str> = recent.iter().filter_map(|i| i["filingDate"].as_str()).collect();
    assert_eq!(dates, vec!["2024-02-02", "2023-11-03"]);
}

#[tokio::test]
async fn test_search_filings_pages_from_start_offset() {
    init_test_logging();
    log_test_step("Full-text search starting at offset 100");

    let fetcher = Arc::new(
        FakeFetcher::new()
            .route(SEARCH, efts_hits(100, 100, 1000))
            .route(SEARCH, efts_hits(200, 50, 1000)),
    );
    let (summary, items) = run(
        json!({
            "mode": "search_filings",
            "query": "supply chain",
            "start": 100,
            "maxResults": 150,
            "includeAmendments": true
        }),
        &fetcher,
    )
    .await;

    assert_eq!(summary.scraped, 150);
    assert_eq!(items.len(), 150);
    assert_eq!(items[0]["source"], "full_text_search");
    assert_eq!(items[0]["accessionNumber"], "0001193125-24-000100");
    assert_eq!(items[0]["entityName"], "Apple Inc.");
    assert_eq!(items[0]["tickers"], json!(["AAPL"]));

    let requests = fetcher.requests_to(SEARCH);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].query_value("q"), Some("supply chain"));
    assert_eq!(requests[0].query_value("from"), Some("100"));
    assert_eq!(requests[0].query_value("size"), Some("100"));
    assert_eq!(requests[1].query_value("from"), Some("200"));
    assert_eq!(requests[1].query_value("size"), Some("50"));
}

#[tokio::test]
async fn test_search_filings_filters_and_date_range() {
    let fetcher = Arc::new(FakeFetcher::new().route(SEARCH, efts_hits(0, 9, 9)));
    let (_, items) = run(
        json!({
            "mode": "search_filings",
            "query": "merger",
            "forms": ["8-k"],
            "dateFrom": "2024-01-01"
        }),
        &fetcher,
    )
    .await;

    // Every third hit is an 8-K/A
    assert_eq!(items.len(), 6);
    assert!(items.iter().all(|i| i["form"] == "8-K"));

    let request = &fetcher.requests_to(SEARCH)[0];
    assert_eq!(request.query_value("forms"), Some("8-K"));
    assert_eq!(request.query_value("dateRange"), Some("custom"));
    assert_eq!(request.query_value("startdt"), Some("2024-01-01"));
    assert!(request.query_value("enddt").is_some());
}

#[tokio::test]
async fn test_unresolvable_entity_counts_one_failure() {
    init_test_logging();

    let fetcher = Arc::new(
        FakeFetcher::new()
            .route(TICKERS, company_tickers())
            .route(SEARCH, efts_no_hits()),
    );
    let config = EdgarConfig::from_input(&json!({
        "mode": "company_filings",
        "query": "Nonexistent Holdings"
    }))
    .unwrap();
    let dataset = Arc::new(MemoryDataset::new());
    let mut run = ActorRun::new(dataset.clone(), Arc::new(MemoryStore::new()), PlatformEnv::default());

    let outcome = run_edgar_with(&mut run, config, Endpoints::with_base(FAKE_BASE), fetcher.clone()).await;

    let summary = assert_matches!(outcome, RunOutcome::Completed(summary) => summary);
    assert_eq!(summary.scraped, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.message, "Done. Scraped 0 items. 1 errors encountered.");
    assert!(dataset.push_sizes().is_empty());
    assert!(fetcher.requests_to(APPLE_SUBMISSIONS).is_empty());
}

#[tokio::test]
async fn test_invalid_edgar_input_fails_before_network() {
    for (input, expected) in [
        (json!({"mode": "search_filings"}), "search query is required"),
        (json!({"mode": "company_facts"}), "company_facts"),
        (json!({"cik": "12345678901"}), "more than 10 digits"),
        (json!({"cik": "320193", "periodType": "weekly"}), "weekly"),
        (json!({"ticker": "AAPL", "dateTo": "2024-13"}), "dateTo"),
    ] {
        let dataset = Arc::new(MemoryDataset::new());
        let mut run = ActorRun::new(dataset.clone(), Arc::new(MemoryStore::new()), PlatformEnv::default());

        let outcome = run_edgar(&mut run, &input, Endpoints::default()).await.unwrap();

        let message = assert_matches!(outcome, RunOutcome::Failed(message) => message);
        assert!(message.contains(expected), "{} should mention {}", message, expected);
        assert!(dataset.records().is_empty());
    }
}
