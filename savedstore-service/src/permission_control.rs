//! The permission-evaluation service.
//!
//! Each call is a pure function of the request context and the current
//! object state: principals are derived from the context, objects are
//! fetched from the repository, and the ACL decides. No retries are
//! attempted; a fetch failure is surfaced, not masked.

use savedstore_types::acl::Acl;
use savedstore_types::object::{SavedObject, SavedObjectRef, WORKSPACE_TYPE};
use savedstore_types::permission::Permission;
use savedstore_types::principal::Principals;

use crate::auth::AuthContext;
use crate::error::ServiceResult;
use crate::repository::{FindOptions, SavedObjectRepository};

/// Upper bound on workspaces returned by a permitted-workspace query.
const MAX_WORKSPACES: usize = 999;

/// Decides whether a request's principals satisfy a required permission
/// set against one or more stored objects.
#[derive(Clone, Debug)]
pub struct PermissionControl {
    repository: SavedObjectRepository,
}

impl PermissionControl {
    /// Creates a permission control over the raw (unwrapped) repository.
    pub fn new(repository: SavedObjectRepository) -> Self {
        Self { repository }
    }

    /// Derives the principal set from the request context.
    ///
    /// See [`AuthContext::principals`] for the open-mode and
    /// fake-user semantics.
    pub fn get_principals(&self, ctx: &AuthContext) -> Principals {
        ctx.principals()
    }

    /// Pure ACL evaluation against an already-fetched object.
    ///
    /// Objects without an ACL predate access control and are implicitly
    /// permitted.
    pub fn validate_object_acl(
        &self,
        object: &SavedObject,
        principals: &Principals,
        modes: &[Permission],
    ) -> bool {
        match &object.permissions {
            None => true,
            Some(acl) => acl.has_permission(modes, principals),
        }
    }

    /// Fetches the object and checks the caller against every required mode.
    pub async fn validate(
        &self,
        ctx: &AuthContext,
        object_ref: &SavedObjectRef,
        modes: &[Permission],
    ) -> ServiceResult<bool> {
        self.batch_validate(ctx, std::slice::from_ref(object_ref), modes)
            .await
    }

    /// Fetches all objects in one round trip and ANDs their individual
    /// validations. A fetch failure on any object fails the whole call.
    pub async fn batch_validate(
        &self,
        ctx: &AuthContext,
        refs: &[SavedObjectRef],
        modes: &[Permission],
    ) -> ServiceResult<bool> {
        let principals = ctx.principals();
        if principals.is_empty() {
            // Open mode: no authentication interceptor, nothing to check.
            return Ok(true);
        }

        let objects = self.repository.bulk_get(refs).await?;
        Ok(objects
            .iter()
            .all(|object| self.validate_object_acl(object, &principals, modes)))
    }

    /// The IDs of every workspace whose ACL grants the caller any of the
    /// given modes.
    pub async fn permitted_workspace_ids(
        &self,
        ctx: &AuthContext,
        modes: &[Permission],
    ) -> ServiceResult<Vec<String>> {
        let principals = ctx.principals();

        let acl_filter = if principals.is_empty() {
            // Open mode: every workspace is permitted.
            None
        } else {
            Some(Acl::query_dsl(modes, None, &principals))
        };

        let options = FindOptions {
            acl_filter,
            per_page: MAX_WORKSPACES,
            ..FindOptions::for_type(WORKSPACE_TYPE)
        };
        let response = self.repository.find(options).await?;

        Ok(response
            .saved_objects
            .into_iter()
            .map(|object| object.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use savedstore_types::principal::StringOrWildcard;
    use serde_json::json;

    use crate::error::ServiceError;

    use super::*;

    fn acl(mode: Permission, users: &[&str]) -> Acl {
        let users: Vec<StringOrWildcard> = users.iter().map(|u| StringOrWildcard::from(*u)).collect();
        Acl::single(mode, &users, &[])
    }

    fn object(ty: &str, id: &str, permissions: Option<Acl>) -> SavedObject {
        SavedObject {
            id: id.to_owned(),
            ty: ty.to_owned(),
            attributes: json!({ "name": id }),
            workspaces: Vec::new(),
            permissions,
        }
    }

    fn alice() -> AuthContext {
        AuthContext::authenticated(Some("alice".into()), Vec::new())
    }

    #[tokio::test]
    async fn test_validate_acl_less_object_is_permitted() {
        let (repository, backend) = SavedObjectRepository::in_memory();
        backend.insert(object("dashboard", "legacy", None));

        let control = PermissionControl::new(repository);
        let permitted = control
            .validate(
                &alice(),
                &SavedObjectRef::new("dashboard", "legacy"),
                &[Permission::Write],
            )
            .await
            .unwrap();
        assert!(permitted);
    }

    #[tokio::test]
    async fn test_validate_requires_every_mode() {
        let (repository, backend) = SavedObjectRepository::in_memory();
        backend.insert(object(
            "dashboard",
            "d1",
            Some(acl(Permission::Read, &["alice"])),
        ));

        let control = PermissionControl::new(repository);
        let object_ref = SavedObjectRef::new("dashboard", "d1");

        assert!(
            control
                .validate(&alice(), &object_ref, &[Permission::Read])
                .await
                .unwrap()
        );
        assert!(
            !control
                .validate(
                    &alice(),
                    &object_ref,
                    &[Permission::Read, Permission::Write]
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_batch_validate_ands_across_objects() {
        let (repository, backend) = SavedObjectRepository::in_memory();
        backend.insert(object(
            "dashboard",
            "mine",
            Some(acl(Permission::Read, &["alice"])),
        ));
        backend.insert(object(
            "dashboard",
            "theirs",
            Some(acl(Permission::Read, &["bob"])),
        ));

        let control = PermissionControl::new(repository);
        let refs = [
            SavedObjectRef::new("dashboard", "mine"),
            SavedObjectRef::new("dashboard", "theirs"),
        ];

        assert!(
            !control
                .batch_validate(&alice(), &refs, &[Permission::Read])
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_batch_validate_fetch_failure_is_an_error() {
        let (repository, backend) = SavedObjectRepository::in_memory();
        backend.insert(object("dashboard", "d1", None));

        let control = PermissionControl::new(repository);
        let refs = [
            SavedObjectRef::new("dashboard", "d1"),
            SavedObjectRef::new("dashboard", "missing"),
        ];

        assert!(matches!(
            control
                .batch_validate(&alice(), &refs, &[Permission::Read])
                .await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_mode_is_unrestricted() {
        let (repository, backend) = SavedObjectRepository::in_memory();
        backend.insert(object(
            "dashboard",
            "d1",
            Some(acl(Permission::Write, &["bob"])),
        ));

        let control = PermissionControl::new(repository);
        let permitted = control
            .validate(
                &AuthContext::disabled(),
                &SavedObjectRef::new("dashboard", "d1"),
                &[Permission::Write],
            )
            .await
            .unwrap();
        assert!(permitted);
    }

    #[tokio::test]
    async fn test_permitted_workspace_ids() {
        let (repository, backend) = SavedObjectRepository::in_memory();
        backend.insert(object(
            WORKSPACE_TYPE,
            "alpha",
            Some(acl(Permission::LibraryRead, &["alice"])),
        ));
        backend.insert(object(
            WORKSPACE_TYPE,
            "beta",
            Some(acl(Permission::LibraryRead, &["bob"])),
        ));
        backend.insert(object(
            WORKSPACE_TYPE,
            "shared",
            Some(acl(Permission::LibraryRead, &["*"])),
        ));

        let control = PermissionControl::new(repository);
        let mut permitted = control
            .permitted_workspace_ids(&alice(), &[Permission::LibraryRead])
            .await
            .unwrap();
        permitted.sort();

        assert_eq!(permitted, vec!["alpha", "shared"]);
    }
}
