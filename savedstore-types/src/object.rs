//! The saved-object and workspace data model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::acl::Acl;

/// The reserved object type under which workspaces are stored.
pub const WORKSPACE_TYPE: &str = "workspace";

/// The world-readable/writable default workspace.
pub const PUBLIC_WORKSPACE_ID: &str = "public";

/// The world-readable, restricted-write administration workspace.
pub const MANAGEMENT_WORKSPACE_ID: &str = "management";

/// Workspace IDs that exist by convention and must never be deleted.
pub const RESERVED_WORKSPACE_IDS: &[&str] = &[PUBLIC_WORKSPACE_ID, MANAGEMENT_WORKSPACE_ID];

/// A `{type, id}` reference to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SavedObjectRef {
    /// The object type.
    #[serde(rename = "type")]
    pub ty: String,
    /// The object ID, unique within its type.
    pub id: String,
}

impl SavedObjectRef {
    /// Creates a reference from type and ID.
    pub fn new(ty: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            id: id.into(),
        }
    }
}

/// A stored document: typed attributes plus the two access-control
/// facets, the workspaces it is visible in and its optional ACL.
///
/// Objects without a `permissions` attribute predate access control and
/// are implicitly permitted by ACL evaluation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SavedObject {
    /// The object ID, unique within its type.
    pub id: String,

    /// The object type.
    #[serde(rename = "type")]
    pub ty: String,

    /// Opaque, type-specific attributes.
    pub attributes: Value,

    /// Workspaces this object is visible in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<String>,

    /// The object's own ACL, if it carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Acl>,
}

impl SavedObject {
    /// The `{type, id}` reference to this object.
    pub fn object_ref(&self) -> SavedObjectRef {
        SavedObjectRef::new(&self.ty, &self.id)
    }
}

/// The user-editable attributes of a workspace.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WorkspaceAttributes {
    /// Display name; unique across workspaces.
    pub name: String,

    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Application features enabled inside the workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,

    /// Accent color shown in navigation chrome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Icon identifier shown in navigation chrome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Default visualization theme for the workspace.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "defaultVISTheme")]
    pub default_vis_theme: Option<String>,
}

/// A workspace: a tenancy boundary grouping saved objects.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Workspace {
    /// The workspace ID.
    pub id: String,

    /// The workspace's attributes.
    #[serde(flatten)]
    pub attributes: WorkspaceAttributes,

    /// The ACL governing who may read, write, and administer the
    /// workspace and its contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Acl>,
}

/// Error converting a stored document into a [`Workspace`].
#[derive(Debug, thiserror::Error)]
#[error("saved object {id} of type `{ty}` cannot be read as a workspace")]
pub struct InvalidWorkspaceObject {
    /// The offending object's ID.
    pub id: String,
    /// The offending object's type.
    pub ty: String,
}

impl TryFrom<SavedObject> for Workspace {
    type Error = InvalidWorkspaceObject;

    fn try_from(object: SavedObject) -> Result<Self, Self::Error> {
        if object.ty != WORKSPACE_TYPE {
            return Err(InvalidWorkspaceObject {
                id: object.id,
                ty: object.ty,
            });
        }

        let attributes =
            serde_json::from_value(object.attributes).map_err(|_| InvalidWorkspaceObject {
                id: object.id.clone(),
                ty: object.ty.clone(),
            })?;

        Ok(Workspace {
            id: object.id,
            attributes,
            permissions: object.permissions,
        })
    }
}

impl From<Workspace> for SavedObject {
    fn from(workspace: Workspace) -> Self {
        SavedObject {
            id: workspace.id,
            ty: WORKSPACE_TYPE.to_owned(),
            // WorkspaceAttributes serialization is infallible.
            attributes: serde_json::to_value(&workspace.attributes).expect("plain struct"),
            workspaces: Vec::new(),
            permissions: workspace.permissions,
        }
    }
}
