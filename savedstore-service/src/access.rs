//! The access-controlled client over the repository.
//!
//! [`AccessControl`] owns the middleware chain; [`AccessAwareRepository`]
//! is the per-request client it hands out. Every call is turned into a
//! typed [`Operation`], run through the chain in its fixed order
//! (workspace scoping, then authorization), and only then dispatched to
//! the raw repository.

use std::sync::Arc;

use savedstore_types::object::{SavedObject, SavedObjectRef};
use tokio::sync::watch;

use crate::auth::{AuthContext, DashboardAdmins};
use crate::error::ServiceResult;
use crate::middleware::{Authorization, OperationMiddleware, WorkspaceScoping};
use crate::operation::{
    AddToWorkspacesOperation, BulkCreateOperation, BulkGetOperation, BulkUpdateOperation,
    CreateOperation, DeleteOperation, FindOperation, GetOperation, NewSavedObject, Operation,
    UpdateOperation,
};
use crate::repository::{FindOptions, FindResponse, SavedObjectRepository};

/// Factory for per-request access-controlled clients.
///
/// Cheap to clone; all clones share the repository and the middleware
/// chain.
#[derive(Clone, Debug)]
pub struct AccessControl {
    repository: SavedObjectRepository,
    middlewares: Vec<Arc<dyn OperationMiddleware>>,
}

impl AccessControl {
    /// Builds the chain over the raw repository.
    ///
    /// `admins` is the dashboard-admin configuration stream consumed by
    /// the authorization layer.
    pub fn new(
        repository: SavedObjectRepository,
        scoping: WorkspaceScoping,
        admins: watch::Receiver<DashboardAdmins>,
    ) -> Self {
        // Scoping runs before authorization so that authorization sees
        // the final workspace assignment.
        let middlewares: Vec<Arc<dyn OperationMiddleware>> = vec![
            Arc::new(scoping),
            Arc::new(Authorization::new(repository.clone(), admins)),
        ];
        Self {
            repository,
            middlewares,
        }
    }

    /// The raw, unwrapped repository.
    pub fn repository(&self) -> &SavedObjectRepository {
        &self.repository
    }

    /// An access-controlled client bound to one request's context.
    pub fn client(&self, context: AuthContext) -> AccessAwareRepository {
        AccessAwareRepository {
            repository: self.repository.clone(),
            middlewares: self.middlewares.clone(),
            context,
        }
    }
}

/// An access-controlled client bound to a single request.
///
/// Implements the full storage-client surface; each method runs its
/// operation through the middleware chain before touching the
/// repository.
#[derive(Debug)]
pub struct AccessAwareRepository {
    repository: SavedObjectRepository,
    middlewares: Vec<Arc<dyn OperationMiddleware>>,
    context: AuthContext,
}

impl AccessAwareRepository {
    /// The request context this client is bound to.
    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    async fn run(&self, mut operation: Operation) -> ServiceResult<Operation> {
        for middleware in &self.middlewares {
            operation = middleware.apply(&self.context, operation).await?;
        }
        Ok(operation)
    }

    /// Creates one object.
    pub async fn create(
        &self,
        object: NewSavedObject,
        overwrite: bool,
    ) -> ServiceResult<SavedObject> {
        let operation = Operation::Create(CreateOperation { object, overwrite });
        match self.run(operation).await? {
            Operation::Create(create) => {
                self.repository
                    .create(create.object.into_saved_object(), create.overwrite)
                    .await
            }
            _ => unreachable!("middleware changed the operation kind"),
        }
    }

    /// Creates many objects.
    pub async fn bulk_create(
        &self,
        objects: Vec<NewSavedObject>,
        overwrite: bool,
    ) -> ServiceResult<Vec<SavedObject>> {
        let operation = Operation::BulkCreate(BulkCreateOperation { objects, overwrite });
        match self.run(operation).await? {
            Operation::BulkCreate(bulk) => {
                let objects = bulk
                    .objects
                    .into_iter()
                    .map(NewSavedObject::into_saved_object)
                    .collect();
                self.repository.bulk_create(objects, bulk.overwrite).await
            }
            _ => unreachable!("middleware changed the operation kind"),
        }
    }

    /// Fetches one object.
    pub async fn get(&self, ty: &str, id: &str) -> ServiceResult<SavedObject> {
        let operation = Operation::Get(GetOperation {
            object: SavedObjectRef::new(ty, id),
        });
        match self.run(operation).await? {
            Operation::Get(get) => self.repository.get(&get.object.ty, &get.object.id).await,
            _ => unreachable!("middleware changed the operation kind"),
        }
    }

    /// Fetches many objects in one round trip.
    pub async fn bulk_get(&self, refs: Vec<SavedObjectRef>) -> ServiceResult<Vec<SavedObject>> {
        let operation = Operation::BulkGet(BulkGetOperation { objects: refs });
        match self.run(operation).await? {
            Operation::BulkGet(bulk) => self.repository.bulk_get(&bulk.objects).await,
            _ => unreachable!("middleware changed the operation kind"),
        }
    }

    /// Replaces one object.
    pub async fn update(&self, object: SavedObject) -> ServiceResult<SavedObject> {
        let operation = Operation::Update(UpdateOperation { object });
        match self.run(operation).await? {
            Operation::Update(update) => self.repository.update(update.object).await,
            _ => unreachable!("middleware changed the operation kind"),
        }
    }

    /// Replaces many objects.
    pub async fn bulk_update(&self, objects: Vec<SavedObject>) -> ServiceResult<Vec<SavedObject>> {
        let operation = Operation::BulkUpdate(BulkUpdateOperation { objects });
        match self.run(operation).await? {
            Operation::BulkUpdate(bulk) => self.repository.bulk_update(bulk.objects).await,
            _ => unreachable!("middleware changed the operation kind"),
        }
    }

    /// Deletes one object.
    pub async fn delete(&self, ty: &str, id: &str) -> ServiceResult<()> {
        let operation = Operation::Delete(DeleteOperation {
            object: SavedObjectRef::new(ty, id),
        });
        match self.run(operation).await? {
            Operation::Delete(delete) => {
                self.repository
                    .delete(&delete.object.ty, &delete.object.id)
                    .await
            }
            _ => unreachable!("middleware changed the operation kind"),
        }
    }

    /// Executes a search with the chain's filters applied.
    pub async fn find(&self, options: FindOptions) -> ServiceResult<FindResponse> {
        let operation = Operation::Find(FindOperation { options });
        match self.run(operation).await? {
            Operation::Find(find) => self.repository.find(find.options).await,
            _ => unreachable!("middleware changed the operation kind"),
        }
    }

    /// Shares an object into further workspaces.
    pub async fn add_to_workspaces(
        &self,
        ty: &str,
        id: &str,
        workspaces: Vec<String>,
    ) -> ServiceResult<SavedObject> {
        let operation = Operation::AddToWorkspaces(AddToWorkspacesOperation {
            object: SavedObjectRef::new(ty, id),
            workspaces,
        });
        match self.run(operation).await? {
            Operation::AddToWorkspaces(add) => {
                self.repository
                    .add_to_workspaces(&add.object.ty, &add.object.id, &add.workspaces)
                    .await
            }
            _ => unreachable!("middleware changed the operation kind"),
        }
    }
}

#[cfg(test)]
mod tests {
    use savedstore_types::acl::Acl;
    use savedstore_types::object::WORKSPACE_TYPE;
    use savedstore_types::permission::Permission;
    use savedstore_types::principal::StringOrWildcard;
    use serde_json::json;

    use crate::backend::InMemoryBackend;
    use crate::error::ServiceError;

    use super::*;

    struct Fixture {
        access: AccessControl,
        backend: InMemoryBackend,
        admins_tx: watch::Sender<DashboardAdmins>,
    }

    fn fixture() -> Fixture {
        let (repository, backend) = SavedObjectRepository::in_memory();
        let (admins_tx, admins_rx) = watch::channel(DashboardAdmins::default());
        Fixture {
            access: AccessControl::new(repository, WorkspaceScoping::default(), admins_rx),
            backend,
            admins_tx,
        }
    }

    fn alice() -> AuthContext {
        AuthContext::authenticated(Some("alice".into()), Vec::new())
    }

    fn seed_workspace(backend: &InMemoryBackend, id: &str, mode: Permission, user: &str) {
        backend.insert(SavedObject {
            id: id.to_owned(),
            ty: WORKSPACE_TYPE.to_owned(),
            attributes: json!({ "name": id }),
            workspaces: Vec::new(),
            permissions: Some(Acl::single(mode, &[StringOrWildcard::from(user)], &[])),
        });
    }

    fn new_object(ty: &str) -> NewSavedObject {
        NewSavedObject {
            ty: ty.to_owned(),
            id: None,
            attributes: json!({ "name": "thing" }),
            permissions: None,
            workspaces: None,
        }
    }

    #[tokio::test]
    async fn test_scoping_feeds_authorization() {
        let fx = fixture();
        seed_workspace(&fx.backend, "alpha", Permission::LibraryWrite, "alice");

        // The ambient workspace is injected by scoping and then checked
        // by authorization, which must see the final assignment.
        let client = fx.access.client(alice().in_workspace("alpha"));
        let created = client.create(new_object("dashboard"), false).await.unwrap();
        assert_eq!(created.workspaces, vec!["alpha"]);

        let client = fx.access.client(alice().in_workspace("beta"));
        let denied = client.create(new_object("dashboard"), false).await;
        // `beta` does not exist, so the target-workspace fetch fails.
        assert!(matches!(denied, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_denied_type_is_rejected_before_any_write() {
        let fx = fixture();
        seed_workspace(&fx.backend, "alpha", Permission::LibraryWrite, "alice");

        let client = fx.access.client(alice().in_workspace("alpha"));
        let result = client.create(new_object("data-source"), false).await;

        assert!(matches!(result, Err(ServiceError::BadRequest(_))));
        assert!(!fx.backend.contains("data-source", "thing"));
        assert!(fx.backend.get_stored(WORKSPACE_TYPE, "alpha").is_some());
    }

    #[tokio::test]
    async fn test_find_returns_only_visible_objects() {
        let fx = fixture();
        seed_workspace(&fx.backend, "alpha", Permission::LibraryRead, "alice");
        seed_workspace(&fx.backend, "beta", Permission::LibraryRead, "bob");

        for (id, workspace) in [("mine", "alpha"), ("theirs", "beta")] {
            fx.backend.insert(SavedObject {
                id: id.to_owned(),
                ty: "dashboard".to_owned(),
                attributes: json!({ "name": id }),
                workspaces: vec![workspace.to_owned()],
                permissions: None,
            });
        }

        let client = fx.access.client(alice());
        let response = client
            .find(FindOptions::for_type("dashboard"))
            .await
            .unwrap();

        assert_eq!(response.total, 1);
        assert_eq!(response.saved_objects[0].id, "mine");
    }

    #[tokio::test]
    async fn test_dashboard_admin_sees_everything() {
        let fx = fixture();
        seed_workspace(&fx.backend, "alpha", Permission::LibraryRead, "bob");
        fx.backend.insert(SavedObject {
            id: "d1".to_owned(),
            ty: "dashboard".to_owned(),
            attributes: json!({ "name": "d1" }),
            workspaces: vec!["alpha".to_owned()],
            permissions: None,
        });

        fx.admins_tx
            .send(DashboardAdmins {
                users: vec!["alice".into()],
                groups: Vec::new(),
            })
            .unwrap();

        let client = fx.access.client(alice());
        let response = client
            .find(FindOptions::for_type("dashboard"))
            .await
            .unwrap();
        assert_eq!(response.total, 1);

        assert!(client.get("dashboard", "d1").await.is_ok());
    }
}
