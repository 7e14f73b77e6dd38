//! In-memory backend for tests and development.
//!
//! This provides a [`Backend`](super::Backend) backed by a `HashMap`,
//! removing the need for a running document store in unit tests. The
//! backend is [`Clone`] so tests can hold a handle for direct inspection
//! while the repository owns a boxed copy. Searches evaluate the
//! [`QueryDsl`](savedstore_types::query::QueryDsl) in process, so the
//! injected authorization filters are enforced exactly as a remote
//! store would enforce them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use savedstore_types::object::{SavedObject, SavedObjectRef};
use serde_json::Value;

use super::{Backend, BackendError, SearchRequest, SearchResponse, SortOrder};

type Store = HashMap<(String, String), SavedObject>;

/// A `HashMap`-backed document store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<Mutex<Store>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the stored document, if present.
    pub fn get_stored(&self, ty: &str, id: &str) -> Option<SavedObject> {
        self.store
            .lock()
            .unwrap()
            .get(&(ty.to_owned(), id.to_owned()))
            .cloned()
    }

    /// Returns `true` if the backend contains the given document.
    pub fn contains(&self, ty: &str, id: &str) -> bool {
        self.store
            .lock()
            .unwrap()
            .contains_key(&(ty.to_owned(), id.to_owned()))
    }

    /// Returns `true` if the backend has no stored documents.
    pub fn is_empty(&self) -> bool {
        self.store.lock().unwrap().is_empty()
    }

    /// Inserts a document directly, bypassing the `Backend` trait.
    ///
    /// Useful for seeding fixtures without going through the wrappers.
    pub fn insert(&self, object: SavedObject) {
        self.store
            .lock()
            .unwrap()
            .insert((object.ty.clone(), object.id.clone()), object);
    }
}

#[async_trait::async_trait]
impl Backend for InMemoryBackend {
    async fn index(&self, object: &SavedObject, overwrite: bool) -> Result<(), BackendError> {
        let key = (object.ty.clone(), object.id.clone());
        let mut store = self.store.lock().unwrap();
        if !overwrite && store.contains_key(&key) {
            return Err(BackendError::Conflict(format!(
                "{}:{}",
                object.ty, object.id
            )));
        }
        store.insert(key, object.clone());
        Ok(())
    }

    async fn get(&self, ty: &str, id: &str) -> Result<Option<SavedObject>, BackendError> {
        Ok(self.get_stored(ty, id))
    }

    async fn bulk_get(
        &self,
        refs: &[SavedObjectRef],
    ) -> Result<Vec<Option<SavedObject>>, BackendError> {
        let store = self.store.lock().unwrap();
        Ok(refs
            .iter()
            .map(|r| store.get(&(r.ty.clone(), r.id.clone())).cloned())
            .collect())
    }

    async fn delete(&self, ty: &str, id: &str) -> Result<bool, BackendError> {
        let removed = self
            .store
            .lock()
            .unwrap()
            .remove(&(ty.to_owned(), id.to_owned()));
        Ok(removed.is_some())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
        let snapshot: Vec<SavedObject> = {
            let store = self.store.lock().unwrap();
            store.values().cloned().collect()
        };

        let mut matches: Vec<(Value, SavedObject)> = Vec::new();
        for object in snapshot {
            let doc = serde_json::to_value(&object)?;
            if request.query.matches(&doc) {
                matches.push((doc, object));
            }
        }

        // Stable order even without an explicit sort field.
        let sort_key = |doc: &Value, object: &SavedObject| -> String {
            match &request.sort_field {
                Some(field) => lookup(doc, field)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_owned(),
                None => format!("{}:{}", object.ty, object.id),
            }
        };
        matches.sort_by_key(|(doc, object)| sort_key(doc, object));
        if request.sort_order == SortOrder::Desc {
            matches.reverse();
        }

        let total = matches.len() as u64;
        let page = request.page.max(1);
        let hits = matches
            .into_iter()
            .map(|(_, object)| object)
            .skip((page - 1) * request.per_page)
            .take(request.per_page)
            .collect();

        Ok(SearchResponse { hits, total })
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}
