use crate::models::{Dataset, DatasetCounts};
use anyhow::Result;
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("corrupt {table} row: {reason}")]
    CorruptRow { table: &'static str, reason: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Other(e.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Replace every cached row with the given dataset in one transaction
    async fn replace_dataset(&self, dataset: &Dataset) -> StorageResult<DatasetCounts>;

    /// Distinct store ids present in the status feed, sorted
    async fn store_ids(&self) -> StorageResult<Vec<String>>;

    async fn counts(&self) -> StorageResult<DatasetCounts>;

    /// Latest observation timestamp, the instant report windows end at
    async fn reference_instant(&self) -> StorageResult<Option<DateTime<Utc>>>;

    /// All three feeds as of one instant, read inside a single transaction so
    /// a concurrent `replace_dataset` is seen either entirely or not at all
    async fn snapshot(&self) -> StorageResult<Dataset>;
}
