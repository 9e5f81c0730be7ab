pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod rate_limit;
pub mod request;
pub mod stores;
pub mod traits;

pub use client::GitHubSearchClient;
pub use config::{
    GitHubClientConfig, DEFAULT_GITHUB_API_URL, DEFAULT_GITHUB_API_VERSION, DEFAULT_TIMEOUT_SECONDS,
};
pub use error::{FieldViolation, QueryError, StorageError, TransportError, ValidationError};
pub use ingest::{IngestionMerger, MergeReport};
pub use models::{
    ExternalOwner, ExternalRecord, NewRecord, RecordFilter, RemoteSort, SearchPage, SortKey,
    SortOrder, StoredRecord,
};
pub use orchestrator::{SearchDispatch, SearchOrchestrator};
pub use query::QueryEngine;
pub use rate_limit::{FixedWindowRateLimiter, RateDecision};
pub use request::{
    build_query, normalize_language, RecordQuery, RecordQueryParams, SearchParams, SearchRequest,
    DEFAULT_PER_PAGE, MAX_PAGE, MAX_PER_PAGE,
};
pub use stores::SqliteRecordStore;
pub use traits::{RecordStore, RemoteSearchClient};
