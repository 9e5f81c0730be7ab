use crate::traits::RecordStore;
use crate::{ExternalRecord, NewRecord, StorageError};
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub candidates: usize,
    pub duplicates: usize,
    /// Candidates that had no stored match when looked up.
    pub fresh: usize,
    /// Rows actually written; lower than `fresh` when a concurrent merge won a race.
    pub inserted: usize,
}

/// Merges freshly fetched repositories into the store, writing only those
/// whose external identifier is not stored yet.
pub struct IngestionMerger<S: RecordStore + ?Sized> {
    store: Arc<S>,
}

impl<S: RecordStore + ?Sized> IngestionMerger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Looks up every candidate, then bulk-inserts the unmatched ones in
    /// input order. A failed lookup aborts before anything is written; the
    /// insert is issued even for an empty batch.
    pub async fn merge_and_persist(
        &self,
        candidates: &[ExternalRecord],
    ) -> Result<MergeReport, StorageError> {
        let mut fresh = Vec::with_capacity(candidates.len());
        let mut duplicates = 0;

        for candidate in candidates {
            match self.store.find_by_external_id(candidate.id).await? {
                Some(_) => duplicates += 1,
                None => fresh.push(candidate),
            }
        }

        let now = Utc::now();
        let records: Vec<NewRecord> = fresh
            .into_iter()
            .map(|candidate| NewRecord::from_external(candidate, now))
            .collect();

        let inserted = self.store.insert_all(&records).await?;

        Ok(MergeReport {
            candidates: candidates.len(),
            duplicates,
            fresh: records.len(),
            inserted,
        })
    }
}
