use crate::{
    NewRecord, RecordFilter, SearchPage, SearchRequest, StorageError, StoredRecord,
    TransportError,
};
use async_trait::async_trait;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// A missing identifier never matches.
    async fn find_by_external_id(
        &self,
        external_id: Option<i64>,
    ) -> Result<Option<StoredRecord>, StorageError>;

    /// Persists the batch and returns how many rows were written. Rows whose
    /// external identifier already exists are skipped by the store itself.
    async fn insert_all(&self, records: &[NewRecord]) -> Result<usize, StorageError>;

    async fn query_filtered(&self, filter: &RecordFilter)
        -> Result<Vec<StoredRecord>, StorageError>;

    async fn count(&self) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait RemoteSearchClient: Send + Sync {
    async fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage, TransportError>;
}
