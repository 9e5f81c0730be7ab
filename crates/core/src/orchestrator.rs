use crate::ingest::IngestionMerger;
use crate::traits::{RecordStore, RemoteSearchClient};
use crate::{SearchPage, SearchRequest, TransportError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A remote page plus the background task persisting its items.
///
/// Dropping `ingestion` detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct SearchDispatch {
    pub page: SearchPage,
    pub ingestion: JoinHandle<()>,
}

pub struct SearchOrchestrator<C, S>
where
    C: RemoteSearchClient + ?Sized,
    S: RecordStore + ?Sized,
{
    client: Arc<C>,
    merger: Arc<IngestionMerger<S>>,
}

impl<C, S> SearchOrchestrator<C, S>
where
    C: RemoteSearchClient + ?Sized,
    S: RecordStore + ?Sized + 'static,
{
    pub fn new(client: Arc<C>, store: Arc<S>) -> Self {
        Self {
            client,
            merger: Arc::new(IngestionMerger::new(store)),
        }
    }

    /// Fetches one remote page and hands its items to a detached merge.
    ///
    /// Persistence outcomes are only logged: a storage failure never turns a
    /// successful remote search into an error. On a remote failure nothing is
    /// merged.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchDispatch, TransportError> {
        let page = match self.client.fetch_page(request).await {
            Ok(page) => page,
            Err(error) => {
                warn!(query = %request.query, error = %error, "remote search failed; skipping ingestion");
                return Err(error);
            }
        };

        let items = page.items.clone();
        let merger = Arc::clone(&self.merger);
        let query = request.query.clone();

        let ingestion = tokio::spawn(async move {
            match merger.merge_and_persist(&items).await {
                Ok(report) => info!(
                    query = %query,
                    candidates = report.candidates,
                    duplicates = report.duplicates,
                    fresh = report.fresh,
                    inserted = report.inserted,
                    "persisted search results"
                ),
                Err(error) => error!(
                    query = %query,
                    candidates = items.len(),
                    error = %error,
                    "failed to persist search results"
                ),
            }
        });

        Ok(SearchDispatch { page, ingestion })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ExternalRecord, NewRecord, RecordFilter, SearchParams, SqliteRecordStore, StorageError,
        StoredRecord,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeClient {
        outcome: Mutex<Option<Result<SearchPage, TransportError>>>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn returning(outcome: Result<SearchPage, TransportError>) -> Self {
            Self {
                outcome: Mutex::new(Some(outcome)),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteSearchClient for FakeClient {
        async fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage, TransportError> {
            self.queries.lock().unwrap().push(request.remote_query());
            self.outcome
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(SearchPage::default()))
        }
    }

    #[derive(Default)]
    struct FailingStore {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn find_by_external_id(
            &self,
            _external_id: Option<i64>,
        ) -> Result<Option<StoredRecord>, StorageError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Lock("database unavailable".to_string()))
        }

        async fn insert_all(&self, _records: &[NewRecord]) -> Result<usize, StorageError> {
            Err(StorageError::Lock("database unavailable".to_string()))
        }

        async fn query_filtered(
            &self,
            _filter: &RecordFilter,
        ) -> Result<Vec<StoredRecord>, StorageError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<u64, StorageError> {
            Ok(0)
        }
    }

    fn request(query: &str, language: Option<&str>) -> SearchRequest {
        SearchParams {
            query: Some(query.to_string()),
            language: language.map(str::to_string),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn page(ids: &[i64]) -> SearchPage {
        SearchPage {
            total_count: ids.len() as u64,
            incomplete_results: false,
            items: ids
                .iter()
                .map(|id| ExternalRecord::new(Some(*id), format!("repo-{id}")))
                .collect(),
        }
    }

    #[tokio::test]
    async fn successful_search_returns_page_and_persists_items() {
        let client = Arc::new(FakeClient::returning(Ok(page(&[1, 2, 3]))));
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        let orchestrator = SearchOrchestrator::new(Arc::clone(&client), Arc::clone(&store));

        let dispatch = orchestrator
            .search(&request("spring", Some("Java")))
            .await
            .unwrap();
        assert_eq!(dispatch.page.items.len(), 3);

        dispatch.ingestion.await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(
            client.queries.lock().unwrap().clone(),
            vec!["spring language:Java".to_string()]
        );
    }

    #[tokio::test]
    async fn blank_language_leaves_query_untouched() {
        let client = Arc::new(FakeClient::returning(Ok(page(&[]))));
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        let orchestrator = SearchOrchestrator::new(Arc::clone(&client), store);

        let mut request = request("spring", None);
        request.language = Some("   ".to_string());
        orchestrator.search(&request).await.unwrap();

        assert_eq!(
            client.queries.lock().unwrap().clone(),
            vec!["spring".to_string()]
        );
    }

    #[tokio::test]
    async fn storage_failure_does_not_fail_the_search() {
        let client = Arc::new(FakeClient::returning(Ok(page(&[7]))));
        let store = Arc::new(FailingStore::default());
        let orchestrator = SearchOrchestrator::new(client, Arc::clone(&store));

        let dispatch = orchestrator.search(&request("rust", None)).await.unwrap();
        assert_eq!(dispatch.page.items[0].id, Some(7));

        assert!(dispatch.ingestion.await.is_ok());
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_failure_skips_ingestion() {
        let client = Arc::new(FakeClient::returning(Err(TransportError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })));
        let store = Arc::new(FailingStore::default());
        let orchestrator = SearchOrchestrator::new(client, Arc::clone(&store));

        let error = orchestrator.search(&request("rust", None)).await.unwrap_err();

        assert!(matches!(error, TransportError::Status { status: 503, .. }));
        tokio::task::yield_now().await;
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_searches_do_not_duplicate_records() {
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());

        let batches: [&[i64]; 2] = [&[1, 2], &[1, 2, 3]];
        for ids in batches {
            let client = Arc::new(FakeClient::returning(Ok(page(ids))));
            let orchestrator = SearchOrchestrator::new(client, Arc::clone(&store));
            let dispatch = orchestrator.search(&request("repo", None)).await.unwrap();
            dispatch.ingestion.await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 3);
    }
}
