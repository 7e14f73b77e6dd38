//! Authorization enforcement.
//!
//! Every operation is validated with a two-tier check: workspace level
//! first (one cheap lookup against few workspace objects), then the
//! individual object's own ACL as a fallback. Reads use
//! `read`/`library_read`, mutations use `write`/`library_write`, and
//! workspace objects themselves are governed by their own ACL
//! (`management` for mutation). Searches are not checked after the
//! fact: the query is rewritten so the store never returns unauthorized
//! documents.

use std::collections::{BTreeSet, HashMap};

use savedstore_types::acl::Acl;
use savedstore_types::object::{SavedObject, SavedObjectRef, WORKSPACE_TYPE};
use savedstore_types::permission::Permission;
use savedstore_types::principal::Principals;
use savedstore_types::query::{BoolQuery, QueryDsl};
use tokio::sync::watch;

use crate::auth::{AuthContext, AuthState, DashboardAdmins};
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::OperationMiddleware;
use crate::operation::{NewSavedObject, Operation};
use crate::permission_control::PermissionControl;
use crate::repository::{FindOptions, SavedObjectRepository};

/// The access class of an operation, deciding which modes are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Mutate,
}

impl Access {
    fn workspace_mode(self) -> Permission {
        match self {
            Access::Read => Permission::LibraryRead,
            Access::Mutate => Permission::LibraryWrite,
        }
    }

    fn object_mode(self) -> Permission {
        match self {
            Access::Read => Permission::Read,
            Access::Mutate => Permission::Write,
        }
    }
}

/// Middleware that enforces workspace- and object-level permissions.
#[derive(Debug, Clone)]
pub struct Authorization {
    permission_control: PermissionControl,
    repository: SavedObjectRepository,
    admins: watch::Receiver<DashboardAdmins>,
}

impl Authorization {
    /// Creates the authorization middleware.
    ///
    /// `admins` is the asynchronously-updated dashboard-admin list; its
    /// latest value is read without blocking on every call, and until a
    /// first value arrives the channel's default means "no admins".
    pub fn new(
        repository: SavedObjectRepository,
        admins: watch::Receiver<DashboardAdmins>,
    ) -> Self {
        Self {
            permission_control: PermissionControl::new(repository.clone()),
            repository,
            admins,
        }
    }

    /// Fetches the distinct workspace objects behind `ids` in one round
    /// trip; missing workspaces map to `None` and permit nothing.
    async fn workspace_map<'a>(
        &self,
        ids: impl Iterator<Item = &'a String>,
    ) -> ServiceResult<HashMap<String, Option<SavedObject>>> {
        let unique: BTreeSet<&String> = ids.collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let refs: Vec<SavedObjectRef> = unique
            .iter()
            .map(|id| SavedObjectRef::new(WORKSPACE_TYPE, *id))
            .collect();
        let fetched = self.repository.try_bulk_get(&refs).await?;
        Ok(refs
            .into_iter()
            .zip(fetched)
            .map(|(reference, object)| (reference.id, object))
            .collect())
    }

    fn workspace_permits(
        &self,
        map: &HashMap<String, Option<SavedObject>>,
        id: &str,
        principals: &Principals,
        mode: Permission,
    ) -> bool {
        map.get(id).and_then(Option::as_ref).is_some_and(|ws| {
            self.permission_control
                .validate_object_acl(ws, principals, &[mode])
        })
    }

    /// Validates access to already-fetched objects.
    ///
    /// The workspace-level check runs first and short-circuits, so the
    /// object-level ACL is only consulted when no containing workspace
    /// grants access.
    async fn check_objects(
        &self,
        principals: &Principals,
        objects: &[SavedObject],
        access: Access,
    ) -> ServiceResult<()> {
        let map = self
            .workspace_map(
                objects
                    .iter()
                    .filter(|o| o.ty != WORKSPACE_TYPE)
                    .flat_map(|o| o.workspaces.iter()),
            )
            .await?;

        for object in objects {
            let permitted = if object.ty == WORKSPACE_TYPE {
                let acl_allows = |modes: &[Permission]| {
                    self.permission_control
                        .validate_object_acl(object, principals, modes)
                };
                match access {
                    Access::Read => {
                        acl_allows(&[Permission::Read]) || acl_allows(&[Permission::Management])
                    }
                    Access::Mutate => acl_allows(&[Permission::Management]),
                }
            } else {
                object.workspaces.iter().any(|workspace| {
                    self.workspace_permits(&map, workspace, principals, access.workspace_mode())
                }) || self.permission_control.validate_object_acl(
                    object,
                    principals,
                    &[access.object_mode()],
                )
            };

            if !permitted {
                tracing::debug!(
                    ?principals,
                    ty = %object.ty,
                    id = %object.id,
                    "saved object access denied"
                );
                return Err(if object.ty == WORKSPACE_TYPE {
                    ServiceError::WorkspacePermissionDenied
                } else {
                    ServiceError::SavedObjectsPermissionDenied
                });
            }
        }

        Ok(())
    }

    /// Requires `library_write` on *every* given target workspace.
    async fn check_target_workspaces(
        &self,
        principals: &Principals,
        workspace_ids: &BTreeSet<String>,
    ) -> ServiceResult<()> {
        if workspace_ids.is_empty() {
            return Ok(());
        }

        let refs: Vec<SavedObjectRef> = workspace_ids
            .iter()
            .map(|id| SavedObjectRef::new(WORKSPACE_TYPE, id))
            .collect();
        let workspaces = self.repository.bulk_get(&refs).await?;

        for workspace in &workspaces {
            let permitted = self.permission_control.validate_object_acl(
                workspace,
                principals,
                &[Permission::LibraryWrite],
            );
            if !permitted {
                tracing::debug!(?principals, workspace = %workspace.id, "workspace access denied");
                return Err(ServiceError::WorkspacePermissionDenied);
            }
        }

        Ok(())
    }

    async fn check_create(
        &self,
        principals: &Principals,
        objects: &[NewSavedObject],
        overwrite: bool,
    ) -> ServiceResult<()> {
        let targets: BTreeSet<String> = objects
            .iter()
            .flat_map(|o| o.workspaces.iter().flatten())
            .cloned()
            .collect();
        self.check_target_workspaces(principals, &targets).await?;

        if overwrite {
            // Overwriting an existing object is a mutation of it.
            let refs: Vec<SavedObjectRef> = objects
                .iter()
                .filter_map(|o| o.id.as_ref().map(|id| SavedObjectRef::new(&o.ty, id)))
                .collect();
            if !refs.is_empty() {
                let existing: Vec<SavedObject> = self
                    .repository
                    .try_bulk_get(&refs)
                    .await?
                    .into_iter()
                    .flatten()
                    .collect();
                self.check_objects(principals, &existing, Access::Mutate).await?;
            }
        }

        Ok(())
    }

    /// Validates full-document updates: mutation rights on the existing
    /// object, plus `library_write` on any newly added workspace.
    async fn check_updates(
        &self,
        principals: &Principals,
        new_docs: &[SavedObject],
    ) -> ServiceResult<()> {
        let refs: Vec<SavedObjectRef> = new_docs.iter().map(SavedObject::object_ref).collect();
        let existing = self.repository.bulk_get(&refs).await?;
        self.check_objects(principals, &existing, Access::Mutate).await?;

        let mut added = BTreeSet::new();
        for (new_doc, old_doc) in new_docs.iter().zip(&existing) {
            for workspace in &new_doc.workspaces {
                if !old_doc.workspaces.contains(workspace) {
                    added.insert(workspace.clone());
                }
            }
        }
        self.check_target_workspaces(principals, &added).await
    }

    async fn check_refs(
        &self,
        principals: &Principals,
        refs: &[SavedObjectRef],
        access: Access,
    ) -> ServiceResult<()> {
        let objects = self.repository.bulk_get(refs).await?;
        self.check_objects(principals, &objects, access).await
    }

    async fn rewrite_find(
        &self,
        ctx: &AuthContext,
        principals: &Principals,
        mut options: FindOptions,
    ) -> ServiceResult<FindOptions> {
        let workspace_focused =
            !options.types.is_empty() && options.types.iter().all(|ty| ty == WORKSPACE_TYPE);

        // Listing workspaces is governed by each workspace's own ACL;
        // everything else may additionally be visible through a
        // permitted containing workspace.
        let modes: &[Permission] = if workspace_focused {
            &[Permission::Read, Permission::LibraryRead, Permission::Management]
        } else {
            &[Permission::Read, Permission::LibraryRead]
        };

        let permitted = if workspace_focused && options.workspaces.is_none() {
            Vec::new()
        } else {
            self.permission_control
                .permitted_workspace_ids(ctx, &[Permission::LibraryRead])
                .await?
        };

        if let Some(requested) = options.workspaces.take() {
            let allowed: Vec<String> = requested
                .into_iter()
                .filter(|workspace| permitted.contains(workspace))
                .collect();
            if allowed.is_empty() {
                tracing::debug!(?principals, "find rejected: no permitted workspace in filter");
                return Err(ServiceError::WorkspacePermissionDenied);
            }
            options.workspaces = Some(allowed);
        }

        let mut acl_query = match Acl::query_dsl(modes, None, principals) {
            QueryDsl::Bool(bool_query) => bool_query,
            _ => BoolQuery {
                minimum_should_match: Some(1),
                ..Default::default()
            },
        };
        if !workspace_focused && !permitted.is_empty() {
            acl_query
                .should
                .push(QueryDsl::terms("workspaces", permitted));
        }
        options.acl_filter = Some(QueryDsl::Bool(acl_query));

        Ok(options)
    }
}

#[async_trait::async_trait]
impl OperationMiddleware for Authorization {
    async fn apply(&self, ctx: &AuthContext, operation: Operation) -> ServiceResult<Operation> {
        let AuthState::Authenticated { .. } = ctx.auth else {
            // Open mode: no authentication interceptor is active.
            return Ok(operation);
        };

        let principals = ctx.principals();
        if self.admins.borrow().matches(&principals) {
            tracing::debug!(
                ?principals,
                operation = operation.kind(),
                "dashboard admin bypasses authorization"
            );
            return Ok(operation);
        }

        match operation {
            Operation::Create(create) => {
                self.check_create(
                    &principals,
                    std::slice::from_ref(&create.object),
                    create.overwrite,
                )
                .await?;
                Ok(Operation::Create(create))
            }

            Operation::BulkCreate(bulk) => {
                self.check_create(&principals, &bulk.objects, bulk.overwrite)
                    .await?;
                Ok(Operation::BulkCreate(bulk))
            }

            Operation::Get(get) => {
                self.check_refs(&principals, std::slice::from_ref(&get.object), Access::Read)
                    .await?;
                Ok(Operation::Get(get))
            }

            Operation::BulkGet(bulk) => {
                self.check_refs(&principals, &bulk.objects, Access::Read)
                    .await?;
                Ok(Operation::BulkGet(bulk))
            }

            Operation::Update(update) => {
                self.check_updates(&principals, std::slice::from_ref(&update.object))
                    .await?;
                Ok(Operation::Update(update))
            }

            Operation::BulkUpdate(bulk) => {
                self.check_updates(&principals, &bulk.objects).await?;
                Ok(Operation::BulkUpdate(bulk))
            }

            Operation::Delete(delete) => {
                self.check_refs(
                    &principals,
                    std::slice::from_ref(&delete.object),
                    Access::Mutate,
                )
                .await?;
                Ok(Operation::Delete(delete))
            }

            Operation::AddToWorkspaces(add) => {
                self.check_refs(&principals, std::slice::from_ref(&add.object), Access::Mutate)
                    .await?;
                let targets: BTreeSet<String> = add.workspaces.iter().cloned().collect();
                self.check_target_workspaces(&principals, &targets).await?;
                Ok(Operation::AddToWorkspaces(add))
            }

            Operation::Find(mut find) => {
                find.options = self.rewrite_find(ctx, &principals, find.options).await?;
                Ok(Operation::Find(find))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use savedstore_types::principal::StringOrWildcard;
    use serde_json::json;

    use crate::operation::{
        CreateOperation, DeleteOperation, FindOperation, GetOperation, UpdateOperation,
    };

    use super::*;

    fn acl(grants: &[(Permission, &[&str])]) -> Acl {
        let mut acl = Acl::default();
        for (mode, users) in grants {
            let users: Vec<StringOrWildcard> =
                users.iter().map(|u| StringOrWildcard::from(*u)).collect();
            acl = acl.with_added(&[*mode], &users, &[]);
        }
        acl
    }

    fn workspace(id: &str, acl: Acl) -> SavedObject {
        SavedObject {
            id: id.to_owned(),
            ty: WORKSPACE_TYPE.to_owned(),
            attributes: json!({ "name": id }),
            workspaces: Vec::new(),
            permissions: Some(acl),
        }
    }

    fn dashboard(id: &str, workspaces: &[&str], permissions: Option<Acl>) -> SavedObject {
        SavedObject {
            id: id.to_owned(),
            ty: "dashboard".to_owned(),
            attributes: json!({ "name": id }),
            workspaces: workspaces.iter().map(|w| w.to_string()).collect(),
            permissions,
        }
    }

    fn alice() -> AuthContext {
        AuthContext::authenticated(Some("alice".into()), Vec::new())
    }

    struct Fixture {
        authorization: Authorization,
        repository: SavedObjectRepository,
        admins_tx: watch::Sender<DashboardAdmins>,
    }

    fn fixture() -> Fixture {
        let (repository, _backend) = SavedObjectRepository::in_memory();
        let (admins_tx, admins_rx) = watch::channel(DashboardAdmins::default());
        Fixture {
            authorization: Authorization::new(repository.clone(), admins_rx),
            repository,
            admins_tx,
        }
    }

    fn create_op(ty: &str, workspaces: Option<Vec<String>>) -> Operation {
        Operation::Create(CreateOperation {
            object: NewSavedObject {
                ty: ty.to_owned(),
                id: None,
                attributes: json!({}),
                permissions: None,
                workspaces,
            },
            overwrite: false,
        })
    }

    #[tokio::test]
    async fn test_create_in_workspace_requires_library_write() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryWrite, &["bob"])])),
                false,
            )
            .await
            .unwrap();

        let denied = fx
            .authorization
            .apply(&alice(), create_op("dashboard", Some(vec!["alpha".into()])))
            .await;
        assert!(matches!(
            denied,
            Err(ServiceError::WorkspacePermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_create_in_workspace_with_library_write() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryWrite, &["alice"])])),
                false,
            )
            .await
            .unwrap();

        let allowed = fx
            .authorization
            .apply(&alice(), create_op("dashboard", Some(vec!["alpha".into()])))
            .await;
        assert!(allowed.is_ok());
    }

    #[tokio::test]
    async fn test_create_requires_every_target_workspace() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryWrite, &["alice"])])),
                false,
            )
            .await
            .unwrap();
        fx.repository
            .create(
                workspace("beta", acl(&[(Permission::LibraryWrite, &["bob"])])),
                false,
            )
            .await
            .unwrap();

        let denied = fx
            .authorization
            .apply(
                &alice(),
                create_op("dashboard", Some(vec!["alpha".into(), "beta".into()])),
            )
            .await;
        assert!(matches!(
            denied,
            Err(ServiceError::WorkspacePermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_get_through_workspace_library_read() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryRead, &["alice"])])),
                false,
            )
            .await
            .unwrap();
        fx.repository
            .create(
                dashboard("d1", &["alpha"], Some(acl(&[(Permission::Read, &["bob"])]))),
                false,
            )
            .await
            .unwrap();

        let operation = Operation::Get(GetOperation {
            object: SavedObjectRef::new("dashboard", "d1"),
        });
        assert!(fx.authorization.apply(&alice(), operation).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_through_object_acl_fallback() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryRead, &["bob"])])),
                false,
            )
            .await
            .unwrap();
        fx.repository
            .create(
                dashboard(
                    "d1",
                    &["alpha"],
                    Some(acl(&[(Permission::Read, &["alice"])])),
                ),
                false,
            )
            .await
            .unwrap();

        let operation = Operation::Get(GetOperation {
            object: SavedObjectRef::new("dashboard", "d1"),
        });
        assert!(fx.authorization.apply(&alice(), operation).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_denied_without_either_grant() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryRead, &["bob"])])),
                false,
            )
            .await
            .unwrap();
        fx.repository
            .create(
                dashboard("d1", &["alpha"], Some(acl(&[(Permission::Read, &["bob"])]))),
                false,
            )
            .await
            .unwrap();

        let operation = Operation::Get(GetOperation {
            object: SavedObjectRef::new("dashboard", "d1"),
        });
        assert!(matches!(
            fx.authorization.apply(&alice(), operation).await,
            Err(ServiceError::SavedObjectsPermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_acl_less_object_is_implicitly_permitted() {
        let fx = fixture();
        fx.repository
            .create(dashboard("legacy", &[], None), false)
            .await
            .unwrap();

        let operation = Operation::Delete(DeleteOperation {
            object: SavedObjectRef::new("dashboard", "legacy"),
        });
        assert!(fx.authorization.apply(&alice(), operation).await.is_ok());
    }

    #[tokio::test]
    async fn test_workspace_mutation_requires_management() {
        let fx = fixture();
        fx.repository
            .create(
                workspace(
                    "alpha",
                    acl(&[
                        (Permission::LibraryWrite, &["alice"]),
                        (Permission::Management, &["bob"]),
                    ]),
                ),
                false,
            )
            .await
            .unwrap();

        let operation = Operation::Delete(DeleteOperation {
            object: SavedObjectRef::new(WORKSPACE_TYPE, "alpha"),
        });
        assert!(matches!(
            fx.authorization.apply(&alice(), operation).await,
            Err(ServiceError::WorkspacePermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_update_adding_workspace_requires_library_write_there() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryWrite, &["alice"])])),
                false,
            )
            .await
            .unwrap();
        fx.repository
            .create(
                workspace("beta", acl(&[(Permission::LibraryWrite, &["bob"])])),
                false,
            )
            .await
            .unwrap();
        fx.repository
            .create(dashboard("d1", &["alpha"], None), false)
            .await
            .unwrap();

        let operation = Operation::Update(UpdateOperation {
            object: dashboard("d1", &["alpha", "beta"], None),
        });
        assert!(matches!(
            fx.authorization.apply(&alice(), operation).await,
            Err(ServiceError::WorkspacePermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_admin_bypass_arrives_over_the_channel() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryWrite, &["bob"])])),
                false,
            )
            .await
            .unwrap();

        let ctx = AuthContext::authenticated(Some("alice".into()), vec!["admin_role".into()]);
        let operation = create_op("dashboard", Some(vec!["alpha".into()]));

        // Before the first value arrives, nobody is an admin.
        assert!(matches!(
            fx.authorization.apply(&ctx, operation.clone()).await,
            Err(ServiceError::WorkspacePermissionDenied)
        ));

        fx.admins_tx
            .send(DashboardAdmins {
                users: Vec::new(),
                groups: vec!["admin_role".into()],
            })
            .unwrap();
        assert!(fx.authorization.apply(&ctx, operation).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_mode_passes_everything_through() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryWrite, &["bob"])])),
                false,
            )
            .await
            .unwrap();

        let operation = create_op("dashboard", Some(vec!["alpha".into()]));
        assert!(
            fx.authorization
                .apply(&AuthContext::disabled(), operation)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_find_rewrite_injects_acl_filter() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryRead, &["alice"])])),
                false,
            )
            .await
            .unwrap();

        let operation = Operation::Find(FindOperation {
            options: FindOptions::for_type("dashboard"),
        });
        let Operation::Find(find) = fx.authorization.apply(&alice(), operation).await.unwrap()
        else {
            panic!("expected find");
        };

        let QueryDsl::Bool(acl_query) = find.options.acl_filter.expect("acl filter injected")
        else {
            panic!("expected bool query");
        };
        assert!(acl_query.should.contains(&QueryDsl::terms(
            "workspaces",
            vec!["alpha".to_string()]
        )));
        assert!(acl_query
            .should
            .contains(&QueryDsl::term("permissions.read.users", "alice")));
    }

    #[tokio::test]
    async fn test_find_in_unpermitted_workspace_is_denied() {
        let fx = fixture();
        fx.repository
            .create(
                workspace("alpha", acl(&[(Permission::LibraryRead, &["bob"])])),
                false,
            )
            .await
            .unwrap();

        let operation = Operation::Find(FindOperation {
            options: FindOptions {
                workspaces: Some(vec!["alpha".into()]),
                ..FindOptions::for_type("dashboard")
            },
        });
        assert!(matches!(
            fx.authorization.apply(&alice(), operation).await,
            Err(ServiceError::WorkspacePermissionDenied)
        ));
    }
}
