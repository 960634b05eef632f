//! Output sinks: a numbered dataset and a key-value store, laid out on disk
//! the way the Apify SDK does for local runs:
//!
//! ```text
//! storage/datasets/default/000000001.json
//! storage/key_value_stores/default/INPUT.json
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::Record;

pub const STORAGE_DIR_ENV: &str = "APIFY_LOCAL_STORAGE_DIR";
pub const DEFAULT_STORAGE_DIR: &str = "./storage";
pub const DEFAULT_STORE_NAME: &str = "default";
/// Key-value file that survives a purge.
const INPUT_FILE: &str = "INPUT.json";

/// Append-only sink for output records.
#[async_trait]
pub trait Dataset: Send + Sync {
    async fn push_data(&self, records: &[Record]) -> Result<()>;
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<Value>>;
    async fn set_value(&self, key: &str, value: &Value) -> Result<()>;
}

/// Root of the local storage tree.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `APIFY_LOCAL_STORAGE_DIR`, or `./storage`.
    pub fn from_env() -> Self {
        let root = std::env::var(STORAGE_DIR_ENV)
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn open_dataset(&self) -> Result<LocalDataset> {
        LocalDataset::open(self.root.join("datasets").join(DEFAULT_STORE_NAME)).await
    }

    pub async fn open_key_value_store(&self) -> Result<LocalKeyValueStore> {
        LocalKeyValueStore::open(self.kv_dir()).await
    }

    /// Empty the default dataset and every default key-value record except
    /// `INPUT`, so the next run starts from item 1 with no saved state.
    pub async fn purge_defaults(&self) -> Result<()> {
        let dataset_dir = self.root.join("datasets").join(DEFAULT_STORE_NAME);
        let removed_items = remove_files(&dataset_dir, |_| true).await?;
        let removed_records = remove_files(&self.kv_dir(), |name| name != INPUT_FILE).await?;
        info!(
            "🧹 Purged default storages: {} items, {} records",
            removed_items, removed_records
        );
        Ok(())
    }

    /// Default dataset and key-value store for a run. A fresh run purges
    /// them first; a resumed one keeps what an earlier attempt left.
    pub async fn open_for_run(&self, resume: bool) -> Result<(LocalDataset, LocalKeyValueStore)> {
        if !resume {
            self.purge_defaults().await?;
        }
        Ok((self.open_dataset().await?, self.open_key_value_store().await?))
    }

    fn kv_dir(&self) -> PathBuf {
        self.root.join("key_value_stores").join(DEFAULT_STORE_NAME)
    }
}

/// Delete the plain files in `dir` that `selected` accepts.
/// A missing directory counts as already empty.
async fn remove_files(dir: &Path, selected: impl Fn(&str) -> bool) -> Result<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if entry.file_type().await?.is_file() && selected(name) {
            fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// One pretty-printed JSON file per item, numbered from 1.
pub struct LocalDataset {
    dir: PathBuf,
    last_index: Mutex<u64>,
}

impl LocalDataset {
    /// Numbering continues after any items already in `dir`.
    pub async fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        let mut last_index = 0;
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let index = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|stem| stem.parse::<u64>().ok());
            if let Some(index) = index {
                last_index = last_index.max(index);
            }
        }
        Ok(Self {
            dir,
            last_index: Mutex::new(last_index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Dataset for LocalDataset {
    async fn push_data(&self, records: &[Record]) -> Result<()> {
        let mut last_index = self.last_index.lock().await;
        for record in records {
            let index = *last_index + 1;
            let path = self.dir.join(format!("{:09}.json", index));
            fs::write(&path, serde_json::to_vec_pretty(record)?).await?;
            *last_index = index;
        }
        debug!("Pushed {} items to {}", records.len(), self.dir.display());
        Ok(())
    }
}

pub struct LocalKeyValueStore {
    dir: PathBuf,
}

impl LocalKeyValueStore {
    pub async fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for LocalKeyValueStore {
    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_value(&self, key: &str, value: &Value) -> Result<()> {
        fs::write(self.path_for(key), serde_json::to_vec_pretty(value)?).await?;
        Ok(())
    }
}
