//! Workspace-ID propagation and type restriction.
//!
//! This is the innermost concern of the chain: it decides which
//! workspaces an operation actually targets before authorization looks
//! at them. It needs no repository access and rejects invalid input
//! synchronously, before any round trip.

use std::collections::BTreeSet;

use crate::auth::AuthContext;
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::OperationMiddleware;
use crate::operation::{NewSavedObject, Operation};

/// Object types that may not be created inside a workspace.
const DEFAULT_DENIED_TYPES: &[&str] = &["data-source", "config"];

/// Object types that are global rather than workspace-scoped; any
/// workspace filter on a search for them is stripped.
const DEFAULT_AGNOSTIC_TYPES: &[&str] = &["workspace", "config"];

/// Middleware that applies the request's ambient workspace to
/// operations and restricts which types may live in a workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceScoping {
    denied_types: BTreeSet<String>,
    agnostic_types: BTreeSet<String>,
}

impl Default for WorkspaceScoping {
    fn default() -> Self {
        Self {
            denied_types: DEFAULT_DENIED_TYPES.iter().map(|t| t.to_string()).collect(),
            agnostic_types: DEFAULT_AGNOSTIC_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl WorkspaceScoping {
    /// Creates a scoping middleware with custom type lists.
    pub fn new(
        denied_types: impl IntoIterator<Item = String>,
        agnostic_types: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            denied_types: denied_types.into_iter().collect(),
            agnostic_types: agnostic_types.into_iter().collect(),
        }
    }

    fn scope_new_object(&self, ctx: &AuthContext, object: &mut NewSavedObject) -> ServiceResult<()> {
        // `None` inherits the ambient workspace; an explicit value
        // (including the empty list) is the caller opting out.
        if object.workspaces.is_none() {
            object.workspaces = ctx.workspace_id.clone().map(|id| vec![id]);
        }

        let in_workspace = object
            .workspaces
            .as_ref()
            .is_some_and(|workspaces| !workspaces.is_empty());
        if in_workspace && self.denied_types.contains(&object.ty) {
            return Err(ServiceError::BadRequest(format!(
                "saved objects of type `{}` cannot be created in a workspace",
                object.ty
            )));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl OperationMiddleware for WorkspaceScoping {
    async fn apply(&self, ctx: &AuthContext, operation: Operation) -> ServiceResult<Operation> {
        match operation {
            Operation::Create(mut create) => {
                self.scope_new_object(ctx, &mut create.object)?;
                Ok(Operation::Create(create))
            }

            Operation::BulkCreate(mut bulk) => {
                for object in &mut bulk.objects {
                    self.scope_new_object(ctx, object)?;
                }
                Ok(Operation::BulkCreate(bulk))
            }

            Operation::Find(mut find) => {
                let options = &mut find.options;
                let all_agnostic = !options.types.is_empty()
                    && options
                        .types
                        .iter()
                        .all(|ty| self.agnostic_types.contains(ty));

                if all_agnostic {
                    options.workspaces = None;
                } else if options.workspaces.is_none() {
                    options.workspaces = ctx.workspace_id.clone().map(|id| vec![id]);
                }
                Ok(Operation::Find(find))
            }

            // Reads, updates, and deletes address objects by ID and are
            // not workspace-scoped.
            other => Ok(other),
        }
    }
}
