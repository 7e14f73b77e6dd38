//! Core value types for the savedstore access-control layer.
//!
//! Everything in this crate is pure and in-memory: permission modes,
//! principals, the immutable [`Acl`](acl::Acl) value type, the search
//! query DSL, and the saved-object data model. I/O lives in the service
//! and server crates.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod acl;
pub mod object;
pub mod permission;
pub mod principal;
pub mod query;

pub use acl::{Acl, FlatPermission};
pub use object::{SavedObject, SavedObjectRef, Workspace, WorkspaceAttributes};
pub use permission::Permission;
pub use principal::{PrincipalGrants, Principals, StringOrWildcard};
pub use query::QueryDsl;
