//! Typed storage operations.
//!
//! Every client call is represented as a value of [`Operation`] before
//! it reaches the repository. The middleware chain inspects and rewrites
//! these values; keeping them as a tagged union (instead of overriding
//! methods on a wide client interface) makes the composition order
//! explicit and each middleware testable in isolation.

use savedstore_types::acl::Acl;
use savedstore_types::object::{SavedObject, SavedObjectRef};
use serde_json::Value;
use uuid::Uuid;

use crate::repository::FindOptions;

/// An object to be created.
#[derive(Debug, Clone)]
pub struct NewSavedObject {
    /// The object type.
    pub ty: String,

    /// The object ID; generated when absent.
    pub id: Option<String>,

    /// Opaque, type-specific attributes.
    pub attributes: Value,

    /// The object's initial ACL.
    pub permissions: Option<Acl>,

    /// Target workspaces. `None` means "inherit the request's ambient
    /// workspace"; an explicit empty list opts out of workspace
    /// assignment entirely.
    pub workspaces: Option<Vec<String>>,
}

impl NewSavedObject {
    /// Materializes the stored document, generating an ID if needed.
    pub fn into_saved_object(self) -> SavedObject {
        SavedObject {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            ty: self.ty,
            attributes: self.attributes,
            workspaces: self.workspaces.unwrap_or_default(),
            permissions: self.permissions,
        }
    }
}

/// A create call.
#[derive(Debug, Clone)]
pub struct CreateOperation {
    /// The object to create.
    pub object: NewSavedObject,
    /// Whether an existing object with the same type and ID is replaced.
    pub overwrite: bool,
}

/// A bulk-create call.
#[derive(Debug, Clone)]
pub struct BulkCreateOperation {
    /// The objects to create.
    pub objects: Vec<NewSavedObject>,
    /// Whether existing objects with the same type and ID are replaced.
    pub overwrite: bool,
}

/// A single-object read.
#[derive(Debug, Clone)]
pub struct GetOperation {
    /// The object to fetch.
    pub object: SavedObjectRef,
}

/// A batched read.
#[derive(Debug, Clone)]
pub struct BulkGetOperation {
    /// The objects to fetch.
    pub objects: Vec<SavedObjectRef>,
}

/// A full-document update.
#[derive(Debug, Clone)]
pub struct UpdateOperation {
    /// The replacement document.
    pub object: SavedObject,
}

/// A batched update.
#[derive(Debug, Clone)]
pub struct BulkUpdateOperation {
    /// The replacement documents.
    pub objects: Vec<SavedObject>,
}

/// A delete call.
#[derive(Debug, Clone)]
pub struct DeleteOperation {
    /// The object to delete.
    pub object: SavedObjectRef,
}

/// A search call.
#[derive(Debug, Clone)]
pub struct FindOperation {
    /// The search options; middlewares rewrite these.
    pub options: FindOptions,
}

/// Adds an object to further workspaces.
#[derive(Debug, Clone)]
pub struct AddToWorkspacesOperation {
    /// The object to share.
    pub object: SavedObjectRef,
    /// The workspaces to add it to.
    pub workspaces: Vec<String>,
}

/// A storage operation flowing through the middleware chain.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Create one object.
    Create(CreateOperation),
    /// Create many objects.
    BulkCreate(BulkCreateOperation),
    /// Read one object.
    Get(GetOperation),
    /// Read many objects.
    BulkGet(BulkGetOperation),
    /// Replace one object.
    Update(UpdateOperation),
    /// Replace many objects.
    BulkUpdate(BulkUpdateOperation),
    /// Delete one object.
    Delete(DeleteOperation),
    /// Search for objects.
    Find(FindOperation),
    /// Share an object into further workspaces.
    AddToWorkspaces(AddToWorkspacesOperation),
}

impl Operation {
    /// The operation kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Create(_) => "create",
            Operation::BulkCreate(_) => "bulk_create",
            Operation::Get(_) => "get",
            Operation::BulkGet(_) => "bulk_get",
            Operation::Update(_) => "update",
            Operation::BulkUpdate(_) => "bulk_update",
            Operation::Delete(_) => "delete",
            Operation::Find(_) => "find",
            Operation::AddToWorkspaces(_) => "add_to_workspaces",
        }
    }

    /// Whether this operation modifies stored state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::Create(_)
                | Operation::BulkCreate(_)
                | Operation::Update(_)
                | Operation::BulkUpdate(_)
                | Operation::Delete(_)
                | Operation::AddToWorkspaces(_)
        )
    }
}
