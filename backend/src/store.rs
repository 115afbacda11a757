//! Whole-collection persistence.
//!
//! Every entity lives in a [`Collection`]: a monotonic id counter plus the
//! ordered list of records. A [`RecordStore`] only knows how to load and save a
//! collection wholesale; [`Table`] layers the write gate on top so that the
//! load -> modify -> save cycle of one mutation never interleaves with another.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store encoding error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collection<T> {
    pub counter: u64,
    pub records: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            counter: 0,
            records: Vec::new(),
        }
    }
}

impl<T> Collection<T> {
    /// Hands out the current counter value and advances it.
    pub fn next_id(&mut self) -> u64 {
        let id = self.counter;
        self.counter += 1;
        id
    }
}

#[async_trait]
pub trait RecordStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn load_all(&self) -> Result<Collection<T>, StoreError>;

    async fn save_all(&self, collection: &Collection<T>) -> Result<(), StoreError>;
}

/// Keeps the collection in memory; nothing survives a restart.
pub struct MemoryStore<T> {
    inner: RwLock<Collection<T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Collection::default()),
        }
    }
}

#[async_trait]
impl<T> RecordStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load_all(&self) -> Result<Collection<T>, StoreError> {
        Ok(self.inner.read().await.clone())
    }

    async fn save_all(&self, collection: &Collection<T>) -> Result<(), StoreError> {
        *self.inner.write().await = collection.clone();
        Ok(())
    }
}

/// Pretty-printed JSON file. A missing file reads as an empty collection.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl<T> RecordStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load_all(&self) -> Result<Collection<T>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Collection::default());
            }
            Err(err) => return Err(self.io_error(err)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_all(&self, collection: &Collection<T>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| self.io_error(err))?;
        }

        let payload = serde_json::to_vec_pretty(collection)?;

        // Readers only ever see the old or the new file.
        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, payload)
            .await
            .map_err(|err| self.io_error(err))?;
        if let Err(err) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(self.io_error(err));
        }

        tracing::debug!(
            path = %self.path.display(),
            records = collection.records.len(),
            "collection saved"
        );
        Ok(())
    }
}

/// A record store plus the gate that serializes its writers.
pub struct Table<T>
where
    T: Send + Sync + 'static,
{
    store: Arc<dyn RecordStore<T>>,
    write_gate: Mutex<()>,
}

impl<T> Table<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn RecordStore<T>>) -> Self {
        Self {
            store,
            write_gate: Mutex::new(()),
        }
    }

    /// Snapshot read; does not wait for in-flight writers.
    pub async fn read(&self) -> Result<Collection<T>, StoreError> {
        self.store.load_all().await
    }

    /// Runs `op` against a freshly loaded copy of the collection and saves the
    /// result. The gate covers the whole cycle. When `op` fails nothing is
    /// written.
    pub async fn mutate<R, E, F>(&self, op: F) -> Result<R, E>
    where
        F: FnOnce(&mut Collection<T>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let _guard = self.write_gate.lock().await;
        let mut collection = self.store.load_all().await?;
        let result = op(&mut collection)?;
        self.store.save_all(&collection).await?;
        Ok(result)
    }
}
