//! Workspace lifecycle operations.
//!
//! A thin orchestration layer over the access-controlled client:
//! workspaces are saved objects of a reserved type, so every call here
//! inherits the full wrapper chain. Only the duplicate-name check runs
//! against the raw repository, since names are unique across all
//! workspaces regardless of the caller's visibility.

use savedstore_types::acl::Acl;
use savedstore_types::object::{
    RESERVED_WORKSPACE_IDS, WORKSPACE_TYPE, Workspace, WorkspaceAttributes,
};
use savedstore_types::permission::Permission;
use savedstore_types::principal::StringOrWildcard;
use uuid::Uuid;

use crate::access::AccessAwareRepository;
use crate::backend::SortOrder;
use crate::error::{ServiceError, ServiceResult};
use crate::operation::NewSavedObject;
use crate::repository::{FindOptions, SavedObjectRepository};

/// Options for listing workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceListOptions {
    /// Free-text search over `search_fields`.
    pub search: Option<String>,
    /// Fields searched by `search`.
    pub search_fields: Vec<String>,
    /// 1-based page number.
    pub page: usize,
    /// Page size.
    pub per_page: usize,
    /// Dotted field path to sort by.
    pub sort_field: Option<String>,
    /// Sort direction.
    pub sort_order: SortOrder,
}

impl Default for WorkspaceListOptions {
    fn default() -> Self {
        Self {
            search: None,
            search_fields: vec!["attributes.name".to_owned()],
            page: 1,
            per_page: 20,
            sort_field: None,
            sort_order: SortOrder::Asc,
        }
    }
}

/// One page of workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceList {
    /// The workspaces on this page.
    pub workspaces: Vec<Workspace>,
    /// Total number of matching workspaces.
    pub total: u64,
    /// The requested page.
    pub page: usize,
    /// The requested page size.
    pub per_page: usize,
}

/// Workspace CRUD over the wrapped client.
#[derive(Debug)]
pub struct WorkspaceService {
    client: AccessAwareRepository,
    repository: SavedObjectRepository,
}

impl WorkspaceService {
    /// Creates the service for one request.
    pub fn new(client: AccessAwareRepository, repository: SavedObjectRepository) -> Self {
        Self { client, repository }
    }

    /// Fails if another workspace already uses `name`.
    async fn assert_name_available(&self, name: &str, exclude_id: Option<&str>) -> ServiceResult<()> {
        let options = FindOptions {
            search: Some(name.to_owned()),
            per_page: 100,
            ..FindOptions::for_type(WORKSPACE_TYPE)
        };
        let response = self.repository.find(options).await?;

        let taken = response.saved_objects.iter().any(|object| {
            object.attributes.get("name").and_then(|n| n.as_str()) == Some(name)
                && exclude_id != Some(object.id.as_str())
        });
        if taken {
            return Err(ServiceError::DuplicateWorkspaceName(name.to_owned()));
        }
        Ok(())
    }

    /// Creates a workspace and returns its ID.
    ///
    /// Without an explicit ACL, the creating principals are granted
    /// every mode; in open mode the workspace is created without an ACL.
    pub async fn create(
        &self,
        attributes: WorkspaceAttributes,
        permissions: Option<Acl>,
    ) -> ServiceResult<String> {
        if attributes.name.is_empty() {
            return Err(ServiceError::BadRequest(
                "workspace name must not be empty".to_owned(),
            ));
        }
        self.assert_name_available(&attributes.name, None).await?;

        let permissions = permissions.or_else(|| {
            let principals = self.client.context().principals();
            if principals.is_empty() {
                return None;
            }

            let named = |name: &String| StringOrWildcard::String(name.clone());
            let users: Vec<StringOrWildcard> = principals.users.iter().map(named).collect();
            let groups: Vec<StringOrWildcard> = principals.groups.iter().map(named).collect();
            Some(Acl::default().with_added(&Permission::all(), &users, &groups))
        });

        let id = Uuid::new_v4().to_string();
        let object = NewSavedObject {
            ty: WORKSPACE_TYPE.to_owned(),
            id: Some(id.clone()),
            attributes: serde_json::to_value(&attributes)
                .map_err(|err| ServiceError::InvalidDocument(err.to_string()))?,
            permissions,
            // Workspaces are global; opt out of ambient assignment.
            workspaces: Some(Vec::new()),
        };
        self.client.create(object, false).await?;

        Ok(id)
    }

    /// Fetches one workspace.
    pub async fn get(&self, id: &str) -> ServiceResult<Workspace> {
        let object = self.client.get(WORKSPACE_TYPE, id).await?;
        Workspace::try_from(object).map_err(|err| ServiceError::InvalidDocument(err.to_string()))
    }

    /// Replaces a workspace's attributes, and its ACL when `permissions`
    /// is given.
    pub async fn update(
        &self,
        id: &str,
        attributes: WorkspaceAttributes,
        permissions: Option<Acl>,
    ) -> ServiceResult<()> {
        let current = self.get(id).await?;
        if attributes.name != current.attributes.name {
            self.assert_name_available(&attributes.name, Some(id)).await?;
        }

        let updated = Workspace {
            id: id.to_owned(),
            attributes,
            permissions: permissions.or(current.permissions),
        };
        self.client.update(updated.into()).await?;
        Ok(())
    }

    /// Deletes a workspace.
    ///
    /// Reserved workspaces are rejected before any repository call,
    /// regardless of the caller's permission level.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        if RESERVED_WORKSPACE_IDS.contains(&id) {
            return Err(ServiceError::BadRequest(format!(
                "workspace `{id}` is reserved and cannot be deleted"
            )));
        }

        self.client.delete(WORKSPACE_TYPE, id).await
    }

    /// Lists the workspaces visible to the caller, paginated.
    pub async fn list(&self, options: WorkspaceListOptions) -> ServiceResult<WorkspaceList> {
        let find_options = FindOptions {
            search: options.search,
            search_fields: options.search_fields,
            page: options.page,
            per_page: options.per_page,
            sort_field: options.sort_field,
            sort_order: options.sort_order,
            ..FindOptions::for_type(WORKSPACE_TYPE)
        };
        let response = self.client.find(find_options).await?;

        let mut workspaces = Vec::with_capacity(response.saved_objects.len());
        for object in response.saved_objects {
            let workspace = Workspace::try_from(object)
                .map_err(|err| ServiceError::InvalidDocument(err.to_string()))?;
            workspaces.push(workspace);
        }

        Ok(WorkspaceList {
            workspaces,
            total: response.total,
            page: response.page,
            per_page: response.per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use savedstore_types::object::PUBLIC_WORKSPACE_ID;
    use tokio::sync::watch;

    use crate::access::AccessControl;
    use crate::auth::{AuthContext, DashboardAdmins};
    use crate::middleware::WorkspaceScoping;

    use super::*;

    struct Fixture {
        access: AccessControl,
        admins_tx: watch::Sender<DashboardAdmins>,
    }

    fn fixture() -> Fixture {
        let (repository, _backend) = SavedObjectRepository::in_memory();
        let (admins_tx, admins_rx) = watch::channel(DashboardAdmins::default());
        Fixture {
            access: AccessControl::new(repository, WorkspaceScoping::default(), admins_rx),
            admins_tx,
        }
    }

    fn service_for(fx: &Fixture, ctx: AuthContext) -> WorkspaceService {
        WorkspaceService::new(fx.access.client(ctx), fx.access.repository().clone())
    }

    fn alice() -> AuthContext {
        AuthContext::authenticated(Some("alice".into()), Vec::new())
    }

    fn bob() -> AuthContext {
        AuthContext::authenticated(Some("bob".into()), Vec::new())
    }

    fn attributes(name: &str) -> WorkspaceAttributes {
        WorkspaceAttributes {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_grants_creator_every_mode() {
        let fx = fixture();
        let id = service_for(&fx, alice())
            .create(attributes("Team Alpha"), None)
            .await
            .unwrap();

        let workspace = service_for(&fx, alice()).get(&id).await.unwrap();
        assert_eq!(workspace.attributes.name, "Team Alpha");

        let acl = workspace.permissions.expect("creator ACL");
        let principals = alice().principals();
        assert!(acl.has_permission(&[Permission::Management], &principals));
        assert!(acl.has_permission(&[Permission::LibraryWrite], &principals));
    }

    #[tokio::test]
    async fn test_other_users_cannot_see_the_workspace() {
        let fx = fixture();
        let id = service_for(&fx, alice())
            .create(attributes("Team Alpha"), None)
            .await
            .unwrap();

        let denied = service_for(&fx, bob()).get(&id).await;
        assert!(matches!(
            denied,
            Err(ServiceError::WorkspacePermissionDenied)
        ));

        let listed = service_for(&fx, bob())
            .list(WorkspaceListOptions::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_duplicate_names_are_rejected() {
        let fx = fixture();
        service_for(&fx, alice())
            .create(attributes("Team Alpha"), None)
            .await
            .unwrap();

        // Even a caller who cannot see the first workspace cannot reuse
        // its name.
        let duplicate = service_for(&fx, bob())
            .create(attributes("Team Alpha"), None)
            .await;
        assert!(matches!(
            duplicate,
            Err(ServiceError::DuplicateWorkspaceName(_))
        ));
    }

    #[tokio::test]
    async fn test_update_requires_management() {
        let fx = fixture();
        let service = service_for(&fx, alice());
        let id = service.create(attributes("Team Alpha"), None).await.unwrap();

        service
            .update(&id, attributes("Team Alpha Prime"), None)
            .await
            .unwrap();
        assert_eq!(
            service.get(&id).await.unwrap().attributes.name,
            "Team Alpha Prime"
        );

        let denied = service_for(&fx, bob())
            .update(&id, attributes("Hijacked"), None)
            .await;
        assert!(matches!(
            denied,
            Err(ServiceError::WorkspacePermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_reserved_workspaces_cannot_be_deleted() {
        let fx = fixture();

        // Not even a dashboard admin may delete a reserved workspace.
        fx.admins_tx
            .send(DashboardAdmins {
                users: vec!["alice".into()],
                groups: Vec::new(),
            })
            .unwrap();

        let result = service_for(&fx, alice()).delete(PUBLIC_WORKSPACE_ID).await;
        match result {
            Err(ServiceError::BadRequest(message)) => {
                assert!(message.contains("reserved"));
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_round_trip() {
        let fx = fixture();
        let service = service_for(&fx, alice());
        let id = service.create(attributes("Short Lived"), None).await.unwrap();

        service.delete(&id).await.unwrap();
        assert!(matches!(
            service.get(&id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
