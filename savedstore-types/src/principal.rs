//! Principals and principal grants.
//!
//! A [`Principals`] value carries the identities acting on a request and
//! is derived once per request. A [`PrincipalGrants`] value is the other
//! side: the users and groups registered on an ACL for one permission
//! mode, where the literal `"*"` is a dedicated wildcard sentinel rather
//! than a string that could collide with a real name.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Simple enum for deserializing strings where `'*'` represents a special wildcard value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StringOrWildcard {
    /// Wildcard value.
    Wildcard,
    /// Regular, non-wildcard string value.
    String(String),
}

impl StringOrWildcard {
    /// Returns `true` for the wildcard sentinel.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, StringOrWildcard::Wildcard)
    }
}

impl From<&str> for StringOrWildcard {
    fn from(value: &str) -> Self {
        match value {
            "*" => StringOrWildcard::Wildcard,
            _ => StringOrWildcard::String(value.to_owned()),
        }
    }
}

impl<'de> Deserialize<'de> for StringOrWildcard {
    fn deserialize<D>(deserializer: D) -> Result<StringOrWildcard, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(match value.as_str() {
            "*" => StringOrWildcard::Wildcard,
            _ => StringOrWildcard::String(value),
        })
    }
}

impl Serialize for StringOrWildcard {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl Display for StringOrWildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringOrWildcard::Wildcard => f.write_str("*"),
            StringOrWildcard::String(s) => f.write_str(s),
        }
    }
}

/// The identities acting on a single request.
///
/// Derived once at the transport boundary and immutable for the request's
/// lifetime. An empty value means no authentication interceptor is
/// active; callers treat that as unrestricted access ("open" mode).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Principals {
    /// User names attached to the request.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub users: BTreeSet<String>,

    /// Group (backend role) names attached to the request.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
}

impl Principals {
    /// A principal set with a single user and no groups.
    pub fn from_user(user: impl Into<String>) -> Self {
        Self {
            users: BTreeSet::from([user.into()]),
            groups: BTreeSet::new(),
        }
    }

    /// Returns `true` if neither users nor groups are present.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }
}

/// The users and groups registered on an ACL for one permission mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PrincipalGrants {
    /// Granted user names, or the wildcard matching any user.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub users: BTreeSet<StringOrWildcard>,

    /// Granted group names, or the wildcard matching any group.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<StringOrWildcard>,
}

impl PrincipalGrants {
    /// Returns `true` if no users or groups are granted.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }

    /// Whether the given principals match this grant.
    ///
    /// A match on either side (a listed user or a listed group) is
    /// sufficient; the wildcard matches any principal of its kind, but
    /// only principals that are actually present on the request.
    pub fn matches(&self, principals: &Principals) -> bool {
        let users_match = (!principals.users.is_empty()
            && self.users.contains(&StringOrWildcard::Wildcard))
            || principals
                .users
                .iter()
                .any(|u| self.users.contains(&StringOrWildcard::String(u.clone())));

        let groups_match = (!principals.groups.is_empty()
            && self.groups.contains(&StringOrWildcard::Wildcard))
            || principals
                .groups
                .iter()
                .any(|g| self.groups.contains(&StringOrWildcard::String(g.clone())));

        users_match || groups_match
    }
}
