use crate::traits::RecordStore;
use crate::{QueryError, RecordFilter, SortKey, StoredRecord};
use std::sync::Arc;

/// Read-only access to the accumulated local dataset.
pub struct QueryEngine<S: RecordStore + ?Sized> {
    store: Arc<S>,
}

impl<S: RecordStore + ?Sized> QueryEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// `language` is matched literally, including `Some("")`; callers collapse
    /// blank input with [`crate::normalize_language`] first. `min_score` is
    /// inclusive and may be negative.
    pub async fn get_filtered_records(
        &self,
        language: Option<&str>,
        min_score: Option<i64>,
        sort_key: Option<&str>,
    ) -> Result<Vec<StoredRecord>, QueryError> {
        let filter = RecordFilter {
            language: language.map(str::to_string),
            min_score,
            sort: SortKey::from_token(sort_key)?,
        };

        Ok(self.store.query_filtered(&filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewRecord, SqliteRecordStore, StorageError};
    use async_trait::async_trait;
    use chrono::Utc;

    async fn seeded_engine(rows: &[(i64, &str, &str, i64)]) -> QueryEngine<SqliteRecordStore> {
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        let now = Utc::now();
        let records: Vec<NewRecord> = rows
            .iter()
            .map(|(id, name, language, popularity)| NewRecord {
                external_id: Some(*id),
                name: name.to_string(),
                owner: None,
                description: None,
                language: Some(language.to_string()),
                popularity: *popularity,
                secondary: 0,
                last_activity: None,
                created_at: now,
                touched_at: now,
            })
            .collect();
        store.insert_all(&records).await.unwrap();
        QueryEngine::new(store)
    }

    fn popularity(records: &[StoredRecord]) -> Vec<i64> {
        records.iter().map(|record| record.popularity).collect()
    }

    #[tokio::test]
    async fn threshold_keeps_only_popular_records() {
        let engine = seeded_engine(&[
            (1, "a", "Go", 500),
            (2, "b", "Go", 25_000),
            (3, "c", "Go", 65_000),
            (4, "d", "Go", 200_000),
        ])
        .await;

        let hits = engine
            .get_filtered_records(None, Some(50_000), None)
            .await
            .unwrap();
        assert_eq!(popularity(&hits), vec![200_000, 65_000]);
    }

    #[tokio::test]
    async fn language_filter_with_threshold_sorted_by_stars() {
        let engine = seeded_engine(&[
            (1, "spring-boot", "Java", 45_000),
            (2, "hibernate-orm", "Java", 25_000),
            (3, "django", "Python", 65_000),
            (4, "flask", "Python", 58_000),
            (5, "react", "JavaScript", 200_000),
            (6, "tiny", "Java", 100),
        ])
        .await;

        let hits = engine
            .get_filtered_records(Some("Java"), Some(20_000), Some("stars"))
            .await
            .unwrap();

        assert_eq!(popularity(&hits), vec![45_000, 25_000]);
        assert!(hits.iter().all(|hit| hit.language.as_deref() == Some("Java")));
    }

    #[tokio::test]
    async fn absent_threshold_returns_every_language_match() {
        let engine = seeded_engine(&[
            (1, "a", "Rust", 0),
            (2, "b", "Rust", 10),
            (3, "c", "Go", 10),
        ])
        .await;

        let hits = engine
            .get_filtered_records(Some("Rust"), None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn name_sort_is_non_decreasing() {
        let engine = seeded_engine(&[
            (1, "kafka", "Java", 1),
            (2, "Airflow", "Python", 2),
            (3, "beam", "Java", 3),
        ])
        .await;

        let hits = engine
            .get_filtered_records(None, None, Some("name"))
            .await
            .unwrap();
        let names: Vec<&str> = hits.iter().map(|hit| hit.name.as_str()).collect();
        assert_eq!(names, vec!["Airflow", "beam", "kafka"]);
        assert!(names.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn popularity_sort_is_non_increasing() {
        let engine = seeded_engine(&[(1, "a", "Go", 3), (2, "b", "Go", 9), (3, "c", "Go", 5)]).await;

        let hits = engine
            .get_filtered_records(None, None, Some("popularity"))
            .await
            .unwrap();
        assert!(popularity(&hits).windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[tokio::test]
    async fn unknown_sort_token_is_rejected() {
        let engine = seeded_engine(&[(1, "a", "Go", 3)]).await;

        let error = engine
            .get_filtered_records(None, None, Some("random-token"))
            .await
            .unwrap_err();
        assert!(matches!(error, QueryError::InvalidSortKey(token) if token == "random-token"));
    }

    #[tokio::test]
    async fn storage_failures_escalate() {
        struct BrokenStore;

        #[async_trait]
        impl RecordStore for BrokenStore {
            async fn find_by_external_id(
                &self,
                _external_id: Option<i64>,
            ) -> Result<Option<StoredRecord>, StorageError> {
                Ok(None)
            }

            async fn insert_all(&self, _records: &[NewRecord]) -> Result<usize, StorageError> {
                Ok(0)
            }

            async fn query_filtered(
                &self,
                _filter: &RecordFilter,
            ) -> Result<Vec<StoredRecord>, StorageError> {
                Err(StorageError::Lock("poisoned".to_string()))
            }

            async fn count(&self) -> Result<u64, StorageError> {
                Ok(0)
            }
        }

        let engine = QueryEngine::new(Arc::new(BrokenStore));
        let error = engine.get_filtered_records(None, None, None).await.unwrap_err();
        assert!(matches!(error, QueryError::Storage(StorageError::Lock(_))));
    }
}
