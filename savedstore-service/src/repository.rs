//! The raw saved-object repository.
//!
//! A thin, typed layer over a [`Backend`]: it owns the boxed backend,
//! maps store-level outcomes to [`ServiceError`]s, and assembles the
//! search query for `find`. It performs no authorization; that is the
//! job of the wrapper chain in [`crate::access`].

use std::sync::Arc;

use savedstore_types::object::{SavedObject, SavedObjectRef};
use savedstore_types::query::{BoolQuery, QueryDsl};

use crate::backend::{
    Backend, BackendError, BoxedBackend, InMemoryBackend, SearchRequest, SortOrder,
};
use crate::error::{ServiceError, ServiceResult};

/// High-level asynchronous repository for storing and retrieving saved
/// objects. Cheap to clone; all clones share one backend.
#[derive(Clone, Debug)]
pub struct SavedObjectRepository(Arc<RepositoryInner>);

#[derive(Debug)]
struct RepositoryInner {
    backend: BoxedBackend,
}

/// Options for a `find` operation.
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Object types to return. Empty means all types.
    pub types: Vec<String>,

    /// Free-text search over `search_fields`.
    pub search: Option<String>,

    /// Fields searched by `search`.
    pub search_fields: Vec<String>,

    /// Restrict results to objects in these workspaces.
    pub workspaces: Option<Vec<String>>,

    /// Authorization predicate injected by the wrapper chain. Documents
    /// not matching it are excluded by the store itself.
    pub acl_filter: Option<QueryDsl>,

    /// 1-based page number.
    pub page: usize,

    /// Page size.
    pub per_page: usize,

    /// Dotted field path to sort by.
    pub sort_field: Option<String>,

    /// Sort direction.
    pub sort_order: SortOrder,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            search: None,
            search_fields: vec!["attributes.name".to_owned()],
            workspaces: None,
            acl_filter: None,
            page: 1,
            per_page: 20,
            sort_field: None,
            sort_order: SortOrder::Asc,
        }
    }
}

impl FindOptions {
    /// Options restricted to a single object type.
    pub fn for_type(ty: impl Into<String>) -> Self {
        Self {
            types: vec![ty.into()],
            ..Default::default()
        }
    }

    fn to_query(&self) -> QueryDsl {
        let mut filter = Vec::new();
        if !self.types.is_empty() {
            filter.push(QueryDsl::terms("type", self.types.clone()));
        }
        if let Some(workspaces) = &self.workspaces {
            filter.push(QueryDsl::terms("workspaces", workspaces.clone()));
        }
        if let Some(acl_filter) = &self.acl_filter {
            filter.push(acl_filter.clone());
        }

        let mut must = Vec::new();
        if let Some(search) = &self.search {
            must.push(QueryDsl::SimpleQueryString {
                query: search.clone(),
                fields: self.search_fields.clone(),
            });
        }

        if filter.is_empty() && must.is_empty() {
            return QueryDsl::MatchAll;
        }

        QueryDsl::Bool(BoolQuery {
            must,
            filter,
            ..Default::default()
        })
    }
}

/// One page of `find` results.
#[derive(Debug, Clone)]
pub struct FindResponse {
    /// The objects on this page.
    pub saved_objects: Vec<SavedObject>,
    /// Total number of matching objects.
    pub total: u64,
    /// The requested page.
    pub page: usize,
    /// The requested page size.
    pub per_page: usize,
}

impl SavedObjectRepository {
    /// Creates a repository over the given backend.
    pub fn new(backend: BoxedBackend) -> Self {
        Self(Arc::new(RepositoryInner { backend }))
    }

    /// Creates a repository over a fresh [`InMemoryBackend`], returning
    /// the backend handle for direct inspection in tests.
    pub fn in_memory() -> (Self, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        (Self::new(Box::new(backend.clone())), backend)
    }

    fn backend(&self) -> &dyn Backend {
        self.0.backend.as_ref()
    }

    /// Stores a new object. Fails with [`ServiceError::Conflict`] if an
    /// object with the same type and ID exists and `overwrite` is false.
    pub async fn create(&self, object: SavedObject, overwrite: bool) -> ServiceResult<SavedObject> {
        match self.backend().index(&object, overwrite).await {
            Ok(()) => Ok(object),
            Err(BackendError::Conflict(_)) => Err(ServiceError::Conflict {
                ty: object.ty,
                id: object.id,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Stores many objects. The first failure aborts the batch.
    pub async fn bulk_create(
        &self,
        objects: Vec<SavedObject>,
        overwrite: bool,
    ) -> ServiceResult<Vec<SavedObject>> {
        let mut created = Vec::with_capacity(objects.len());
        for object in objects {
            created.push(self.create(object, overwrite).await?);
        }
        Ok(created)
    }

    /// Fetches one object, failing with [`ServiceError::NotFound`] if absent.
    pub async fn get(&self, ty: &str, id: &str) -> ServiceResult<SavedObject> {
        self.backend()
            .get(ty, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                ty: ty.to_owned(),
                id: id.to_owned(),
            })
    }

    /// Fetches many objects in one round trip, preserving input order.
    /// Any missing object fails the whole call.
    pub async fn bulk_get(&self, refs: &[SavedObjectRef]) -> ServiceResult<Vec<SavedObject>> {
        let fetched = self.backend().bulk_get(refs).await?;

        let mut objects = Vec::with_capacity(refs.len());
        for (reference, object) in refs.iter().zip(fetched) {
            match object {
                Some(object) => objects.push(object),
                None => {
                    return Err(ServiceError::NotFound {
                        ty: reference.ty.clone(),
                        id: reference.id.clone(),
                    });
                }
            }
        }
        Ok(objects)
    }

    /// Fetches many objects in one round trip, mapping missing entries
    /// to `None` instead of failing.
    pub async fn try_bulk_get(
        &self,
        refs: &[SavedObjectRef],
    ) -> ServiceResult<Vec<Option<SavedObject>>> {
        Ok(self.backend().bulk_get(refs).await?)
    }

    /// Replaces an existing object. Fails with [`ServiceError::NotFound`]
    /// if the object does not exist.
    pub async fn update(&self, object: SavedObject) -> ServiceResult<SavedObject> {
        // Full-document replacement, so existence is checked first.
        self.get(&object.ty, &object.id).await?;
        self.backend().index(&object, true).await?;
        Ok(object)
    }

    /// Replaces many existing objects. The first failure aborts the batch.
    pub async fn bulk_update(&self, objects: Vec<SavedObject>) -> ServiceResult<Vec<SavedObject>> {
        let mut updated = Vec::with_capacity(objects.len());
        for object in objects {
            updated.push(self.update(object).await?);
        }
        Ok(updated)
    }

    /// Deletes an object, failing with [`ServiceError::NotFound`] if absent.
    pub async fn delete(&self, ty: &str, id: &str) -> ServiceResult<()> {
        if self.backend().delete(ty, id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound {
                ty: ty.to_owned(),
                id: id.to_owned(),
            })
        }
    }

    /// Executes a paginated search.
    pub async fn find(&self, options: FindOptions) -> ServiceResult<FindResponse> {
        let request = SearchRequest {
            query: options.to_query(),
            page: options.page,
            per_page: options.per_page,
            sort_field: options.sort_field.clone(),
            sort_order: options.sort_order,
        };

        let response = self.backend().search(&request).await?;
        Ok(FindResponse {
            saved_objects: response.hits,
            total: response.total,
            page: options.page,
            per_page: options.per_page,
        })
    }

    /// Adds an object to the given workspaces, returning the updated object.
    pub async fn add_to_workspaces(
        &self,
        ty: &str,
        id: &str,
        workspaces: &[String],
    ) -> ServiceResult<SavedObject> {
        let mut object = self.get(ty, id).await?;
        for workspace in workspaces {
            if !object.workspaces.contains(workspace) {
                object.workspaces.push(workspace.clone());
            }
        }
        self.backend().index(&object, true).await?;
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(ty: &str, id: &str, workspaces: &[&str]) -> SavedObject {
        SavedObject {
            id: id.to_owned(),
            ty: ty.to_owned(),
            attributes: json!({ "name": id }),
            workspaces: workspaces.iter().map(|w| w.to_string()).collect(),
            permissions: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let (repository, _backend) = SavedObjectRepository::in_memory();
        repository
            .create(object("dashboard", "d1", &["alpha"]), false)
            .await
            .unwrap();

        let fetched = repository.get("dashboard", "d1").await.unwrap();
        assert_eq!(fetched.workspaces, vec!["alpha"]);

        let missing = repository.get("dashboard", "nope").await;
        assert!(matches!(missing, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let (repository, _backend) = SavedObjectRepository::in_memory();
        repository
            .create(object("dashboard", "d1", &[]), false)
            .await
            .unwrap();

        let result = repository.create(object("dashboard", "d1", &[]), false).await;
        assert!(matches!(result, Err(ServiceError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_bulk_get_fails_on_missing() {
        let (repository, _backend) = SavedObjectRepository::in_memory();
        repository
            .create(object("dashboard", "d1", &[]), false)
            .await
            .unwrap();

        let refs = [
            SavedObjectRef::new("dashboard", "d1"),
            SavedObjectRef::new("dashboard", "missing"),
        ];
        assert!(matches!(
            repository.bulk_get(&refs).await,
            Err(ServiceError::NotFound { .. })
        ));

        let partial = repository.try_bulk_get(&refs).await.unwrap();
        assert!(partial[0].is_some());
        assert!(partial[1].is_none());
    }

    #[tokio::test]
    async fn test_find_filters_by_workspace() {
        let (repository, _backend) = SavedObjectRepository::in_memory();
        repository
            .create(object("dashboard", "d1", &["alpha"]), false)
            .await
            .unwrap();
        repository
            .create(object("dashboard", "d2", &["beta"]), false)
            .await
            .unwrap();

        let options = FindOptions {
            workspaces: Some(vec!["alpha".into()]),
            ..FindOptions::for_type("dashboard")
        };
        let response = repository.find(options).await.unwrap();

        assert_eq!(response.total, 1);
        assert_eq!(response.saved_objects[0].id, "d1");
    }

    #[tokio::test]
    async fn test_add_to_workspaces_deduplicates() {
        let (repository, backend) = SavedObjectRepository::in_memory();
        repository
            .create(object("dashboard", "d1", &["alpha"]), false)
            .await
            .unwrap();

        repository
            .add_to_workspaces("dashboard", "d1", &["alpha".into(), "beta".into()])
            .await
            .unwrap();

        let stored = backend.get_stored("dashboard", "d1").unwrap();
        assert_eq!(stored.workspaces, vec!["alpha", "beta"]);
    }
}
