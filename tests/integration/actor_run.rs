//! Run lifecycle: batching, resume, failure accounting and the free tier

use std::sync::Arc;

use assert_matches::assert_matches;
use futures::stream::{self, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::assert_ok;

use crate::common::fixtures::{hf_models, FAKE_BASE};
use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::{FakeFetcher, MemoryDataset, MemoryStore};
use data_actors::actor::{run_aiml_with, ActorRun, PlatformEnv, RunOutcome, INPUT_KEY, STATE_KEY};
use data_actors::api::Endpoints;
use data_actors::error::ScraperError;
use data_actors::format::format_model;
use data_actors::models::{AiMlConfig, Record};
use data_actors::pagination::RecordStream;
use data_actors::storage::{KeyValueStore, LocalStorage};

fn model(i: usize) -> Record {
    Record::Model(format_model(&json!({"id": format!("org/m{}", i)})))
}

fn records(count: usize) -> RecordStream<'static> {
    stream::iter((0..count).map(|i| Ok(model(i)))).boxed()
}

fn names(dataset: &MemoryDataset) -> Vec<String> {
    dataset
        .items()
        .iter()
        .map(|item| item["modelName"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_records_are_pushed_in_batches() {
    init_test_logging();
    log_test_step("60 records in batches of 25");

    let dataset = Arc::new(MemoryDataset::new());
    let store = Arc::new(MemoryStore::new());
    let mut run = ActorRun::new(dataset.clone(), store.clone(), PlatformEnv::default()).with_batch_size(25);

    let summary = run.drive(records(60), 100).await;

    assert_eq!(dataset.push_sizes(), vec![25, 25, 10]);
    assert_eq!(summary.scraped, 60);
    assert_eq!(summary.pushed, 60);
    assert_eq!(summary.message, "Done. Scraped 60 items.");
    assert_eq!(run.status_message(), "Done. Scraped 60 items.");
    assert_eq!(store.value(STATE_KEY), Some(json!({"scraped": 60, "failed": 0})));
}

#[tokio::test]
async fn test_stops_at_max_results() {
    let dataset = Arc::new(MemoryDataset::new());
    let mut run = ActorRun::new(dataset.clone(), Arc::new(MemoryStore::new()), PlatformEnv::default())
        .with_batch_size(25);

    let summary = run.drive(records(60), 30).await;

    assert_eq!(summary.scraped, 30);
    assert_eq!(dataset.push_sizes(), vec![25, 5]);
}

#[tokio::test]
async fn test_resumed_run_skips_pushed_items() {
    init_test_logging();
    log_test_step("Resume after 25 items were already pushed");

    let dataset = Arc::new(MemoryDataset::new());
    let store = Arc::new(MemoryStore::new().with_value(STATE_KEY, json!({"scraped": 25, "failed": 0})));
    let mut run = ActorRun::new(dataset.clone(), store.clone(), PlatformEnv::default()).with_batch_size(25);

    let summary = run.drive(records(60), 100).await;
    log_test_data("Summary", &summary);

    assert_eq!(summary.scraped, 60);
    assert_eq!(summary.pushed, 35);
    assert_eq!(dataset.push_sizes(), vec![25, 10]);
    assert_eq!(names(&dataset).first().map(String::as_str), Some("m25"));
    assert_eq!(store.value(STATE_KEY), Some(json!({"scraped": 60, "failed": 0})));
}

#[tokio::test]
async fn test_stream_error_flushes_collected_items() {
    let dataset = Arc::new(MemoryDataset::new());
    let mut run = ActorRun::new(dataset.clone(), Arc::new(MemoryStore::new()), PlatformEnv::default());

    let items = vec![
        Ok(model(0)),
        Ok(model(1)),
        Ok(model(2)),
        Err(ScraperError::EntityNotFound {
            cik: None,
            ticker: Some("NOPE".to_string()),
            query: None,
        }),
        Ok(model(3)),
    ];
    let summary = run.drive(stream::iter(items).boxed(), 100).await;

    assert_eq!(dataset.push_sizes(), vec![3]);
    assert_eq!(names(&dataset), vec!["m0", "m1", "m2"]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.message, "Done. Scraped 3 items. 1 errors encountered.");
}

#[tokio::test]
async fn test_push_failure_is_counted_and_stops() {
    let dataset = Arc::new(MemoryDataset::failing_on_push(2));
    let store = Arc::new(MemoryStore::new());
    let mut run = ActorRun::new(dataset.clone(), store.clone(), PlatformEnv::default()).with_batch_size(10);

    let summary = run.drive(records(50), 100).await;

    assert_eq!(dataset.push_sizes(), vec![10]);
    assert_eq!(summary.scraped, 10);
    assert_eq!(summary.failed, 1);
    assert_eq!(store.value(STATE_KEY), Some(json!({"scraped": 10, "failed": 1})));
}

#[tokio::test]
async fn test_free_tier_caps_results() {
    init_test_logging();
    log_test_step("Non-paying platform user asking for 100 models");

    let fetcher = Arc::new(FakeFetcher::new().route("/api/models", hf_models("llama", 100)));
    let dataset = Arc::new(MemoryDataset::new());
    let env = PlatformEnv {
        is_at_home: true,
        is_paying: false,
    };
    let mut run = ActorRun::new(dataset.clone(), Arc::new(MemoryStore::new()), env);
    let config = AiMlConfig::from_input(&json!({"query": "llama", "maxResults": 100})).unwrap();

    let outcome = run_aiml_with(&mut run, config, Endpoints::with_base(FAKE_BASE), fetcher.clone()).await;

    let summary = assert_matches!(outcome, RunOutcome::Completed(summary) => summary);
    assert_eq!(summary.max_results, 25);
    assert_eq!(summary.scraped, 25);
    assert!(summary.message.ends_with("Free tier limit (25) reached. Subscribe for unlimited results."));
    assert_eq!(fetcher.requests()[0].query_value("limit"), Some("25"));

    let history = run.status_history();
    log_test_data("Status history", &history);
    assert!(history[0].starts_with("Free tier: limited to 25 results."));
    let connecting = history
        .iter()
        .find(|status| status.starts_with("Connecting to data sources..."))
        .expect("connect status");
    assert!(connecting.contains("Free tier: limited to 25 results."));
}

#[tokio::test]
async fn test_paying_user_is_not_capped() {
    let fetcher = Arc::new(FakeFetcher::new().route("/api/models", hf_models("llama", 40)));
    let dataset = Arc::new(MemoryDataset::new());
    let env = PlatformEnv {
        is_at_home: true,
        is_paying: true,
    };
    let mut run = ActorRun::new(dataset.clone(), Arc::new(MemoryStore::new()), env);
    let config = AiMlConfig::from_input(&json!({"query": "llama", "maxResults": 100})).unwrap();

    run_aiml_with(&mut run, config, Endpoints::with_base(FAKE_BASE), fetcher).await;

    assert_eq!(dataset.records().len(), 40);
    assert!(!run.status_message().contains("Free tier"));
    assert!(run.status_history().iter().all(|status| !status.contains("Free tier")));
    assert!(run
        .status_history()
        .contains(&"Connecting to data sources...".to_string()));
}

#[tokio::test]
async fn test_local_storage_layout() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let dataset = Arc::new(assert_ok!(storage.open_dataset().await));
    let store = Arc::new(assert_ok!(storage.open_key_value_store().await));
    let mut run = ActorRun::new(dataset, store.clone(), PlatformEnv::default()).with_batch_size(2);

    run.drive(records(3), 10).await;

    let items_dir = dir.path().join("datasets").join("default");
    assert!(items_dir.join("000000001.json").exists());
    assert!(items_dir.join("000000003.json").exists());
    assert!(!items_dir.join("000000004.json").exists());

    let state = assert_ok!(store.get_value(STATE_KEY).await);
    assert_eq!(state, Some(json!({"scraped": 3, "failed": 0})));
    assert!(dir
        .path()
        .join("key_value_stores")
        .join("default")
        .join("STATE.json")
        .exists());
}

#[tokio::test]
async fn test_fresh_local_run_starts_over() {
    init_test_logging();
    log_test_step("Two fresh runs over the same storage directory");

    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let (_, store) = assert_ok!(storage.open_for_run(true).await);
    assert_ok!(store.set_value(INPUT_KEY, &json!({"query": "bert"})).await);

    for _ in 0..2 {
        let (dataset, store) = assert_ok!(storage.open_for_run(false).await);
        let mut run = ActorRun::new(Arc::new(dataset), Arc::new(store), PlatformEnv::default())
            .with_batch_size(4);
        let summary = run.drive(records(10), 100).await;
        assert_eq!(summary.pushed, 10);
        assert_eq!(summary.scraped, 10);
    }

    let items_dir = dir.path().join("datasets").join("default");
    assert!(items_dir.join("000000010.json").exists());
    assert!(!items_dir.join("000000011.json").exists());
    assert_eq!(assert_ok!(std::fs::read_dir(&items_dir)).count(), 10);

    let (_, store) = assert_ok!(storage.open_for_run(true).await);
    assert_eq!(assert_ok!(store.get_value(INPUT_KEY).await), Some(json!({"query": "bert"})));
    assert_eq!(
        assert_ok!(store.get_value(STATE_KEY).await),
        Some(json!({"scraped": 10, "failed": 0}))
    );
}

#[tokio::test]
async fn test_resumed_local_run_keeps_earlier_items() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());

    let (dataset, store) = assert_ok!(storage.open_for_run(false).await);
    let mut run = ActorRun::new(Arc::new(dataset), Arc::new(store), PlatformEnv::default()).with_batch_size(5);
    run.drive(records(5), 100).await;

    let (dataset, store) = assert_ok!(storage.open_for_run(true).await);
    let mut run = ActorRun::new(Arc::new(dataset), Arc::new(store), PlatformEnv::default()).with_batch_size(5);
    let summary = run.drive(records(12), 100).await;

    assert_eq!(summary.pushed, 7);
    assert_eq!(summary.scraped, 12);
    let items_dir = dir.path().join("datasets").join("default");
    assert!(items_dir.join("000000012.json").exists());
    assert!(!items_dir.join("000000013.json").exists());
}
