//! Storage backends for saved objects.
//!
//! A backend is a thin document store: it persists serialized
//! [`SavedObject`]s and executes [`QueryDsl`] searches. Everything above
//! it (workspace scoping, authorization, the ACL model) is backend
//! agnostic.

use std::fmt::Debug;

use savedstore_types::object::{SavedObject, SavedObjectRef};
use savedstore_types::query::QueryDsl;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod in_memory;
mod remote;

pub use in_memory::InMemoryBackend;
pub use remote::RemoteBackend;

/// A boxed backend trait object.
pub type BoxedBackend = Box<dyn Backend>;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A document with the same type and ID already exists.
    #[error("document `{0}` already exists")]
    Conflict(String),

    /// A transport error talking to the remote store.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote store answered with an unexpected status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// A response that could not be deserialized.
    #[error("malformed backend response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// Sort direction for search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending (the default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// A search request executed by a backend.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The query to execute.
    pub query: QueryDsl,
    /// 1-based page number.
    pub page: usize,
    /// Page size.
    pub per_page: usize,
    /// Dotted field path to sort by; insertion order when absent.
    pub sort_field: Option<String>,
    /// Sort direction.
    pub sort_order: SortOrder,
}

/// The result of a search: one page of hits plus the total match count.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    /// The hits on the requested page.
    pub hits: Vec<SavedObject>,
    /// Total number of matching documents.
    pub total: u64,
}

/// The document-store contract.
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// Stores a document. With `overwrite` false, an existing document
    /// with the same type and ID is a [`BackendError::Conflict`].
    async fn index(&self, object: &SavedObject, overwrite: bool) -> Result<(), BackendError>;

    /// Fetches a document, or `None` if absent.
    async fn get(&self, ty: &str, id: &str) -> Result<Option<SavedObject>, BackendError>;

    /// Fetches many documents in one round trip, preserving input order.
    async fn bulk_get(
        &self,
        refs: &[SavedObjectRef],
    ) -> Result<Vec<Option<SavedObject>>, BackendError>;

    /// Deletes a document. Returns `false` if it did not exist.
    async fn delete(&self, ty: &str, id: &str) -> Result<bool, BackendError>;

    /// Executes a search.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError>;
}
