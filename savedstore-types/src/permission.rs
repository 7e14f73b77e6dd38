//! Permission modes checked by the authorization layer.
//!
//! Modes are a closed set; strings outside of it fail deserialization, so
//! a malformed mode can never be mistaken for a grant.

use serde::{Deserialize, Serialize};

/// Permission modes that control whether different operations are authorized.
///
/// `Read` and `Write` apply to an individual saved object's own ACL.
/// `LibraryRead` and `LibraryWrite` are granted on a workspace and extend
/// to every object the workspace contains. `Management` governs
/// administration of a workspace itself (update, delete, ACL changes).
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read an individual object (serialized as `"read"`).
    Read,

    /// Modify or delete an individual object (serialized as `"write"`).
    Write,

    /// Administer a workspace (serialized as `"management"`).
    Management,

    /// Read any object within a workspace (serialized as `"library_read"`).
    LibraryRead,

    /// Modify any object within a workspace (serialized as `"library_write"`).
    LibraryWrite,
}

impl Permission {
    /// The serialized name of this mode, as stored in object documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Management => "management",
            Permission::LibraryRead => "library_read",
            Permission::LibraryWrite => "library_write",
        }
    }

    /// All modes, in serialization order.
    pub fn all() -> [Permission; 5] {
        [
            Permission::Read,
            Permission::Write,
            Permission::Management,
            Permission::LibraryRead,
            Permission::LibraryWrite,
        ]
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&Permission::LibraryWrite).unwrap(),
            "\"library_write\""
        );
        assert_eq!(
            serde_json::from_str::<Permission>("\"management\"").unwrap(),
            Permission::Management
        );
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(serde_json::from_str::<Permission>("\"admin\"").is_err());
        assert!(serde_json::from_str::<Permission>("\"\"").is_err());
    }
}
