//! Error types for the saved-object service layer.
//!
//! Expected business failures (denial, not-found, validation) are
//! ordinary values of [`ServiceError`]; they are converted to transport
//! errors only at the route boundary, never thrown across the
//! permission-control boundary.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors produced by the repository, the middleware chain, and the
/// workspace service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The caller lacks the required permission on a workspace.
    #[error("invalid workspace permission")]
    WorkspacePermissionDenied,

    /// The caller lacks the required permission on a saved object.
    #[error("invalid saved objects permission")]
    SavedObjectsPermissionDenied,

    /// Malformed input, rejected before any repository call.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The target object does not exist.
    #[error("{ty} `{id}` not found")]
    NotFound {
        /// The object type.
        ty: String,
        /// The object ID.
        id: String,
    },

    /// An object with the same type and ID already exists.
    #[error("{ty} `{id}` already exists")]
    Conflict {
        /// The object type.
        ty: String,
        /// The object ID.
        id: String,
    },

    /// A workspace with the same name already exists.
    #[error("workspace name `{0}` is already in use")]
    DuplicateWorkspaceName(String),

    /// A stored document could not be interpreted.
    #[error("invalid stored document: {0}")]
    InvalidDocument(String),

    /// An error from the storage backend, propagated unchanged.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
