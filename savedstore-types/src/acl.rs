//! The per-object access control list.
//!
//! [`Acl`] is an immutable value type: `with_added` and `with_removed`
//! return new values instead of mutating in place, and there is no
//! reset-on-read accessor. An ACL lives on a saved object (or on a
//! workspace object, where its grants extend to the workspace's
//! contents) and is only ever replaced wholesale on update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::permission::Permission;
use crate::principal::{PrincipalGrants, Principals, StringOrWildcard};
use crate::query::{BoolQuery, QueryDsl};

/// Mapping from permission mode to the principals granted that mode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Acl {
    grants: BTreeMap<Permission, PrincipalGrants>,
}

/// One principal's view of an ACL, used for display and audit output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatPermission {
    /// Whether the principal is a user or a group.
    pub principal_type: PrincipalType,
    /// The principal's name, or the wildcard.
    pub principal_name: StringOrWildcard,
    /// Every mode granted to this principal, in mode order.
    pub permission_types: Vec<Permission>,
}

/// The kind of a principal in a [`FlatPermission`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    /// A user principal.
    User,
    /// A group principal.
    Group,
}

impl Acl {
    /// An ACL with a single mode granted to the given principals.
    pub fn single(
        mode: Permission,
        users: &[StringOrWildcard],
        groups: &[StringOrWildcard],
    ) -> Self {
        Acl::default().with_added(&[mode], users, groups)
    }

    /// Returns `true` if no grants are registered at all.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// The grants registered for a single mode, if any.
    pub fn grants_for(&self, mode: Permission) -> Option<&PrincipalGrants> {
        self.grants.get(&mode)
    }

    /// Whether the principals satisfy *every* one of the required modes.
    ///
    /// Within a single mode, matching on either a listed user or a
    /// listed group is sufficient. An empty mode list never grants, and
    /// neither does an empty principal set: absence of a match is always
    /// denial.
    pub fn has_permission(&self, modes: &[Permission], principals: &Principals) -> bool {
        if modes.is_empty() {
            return false;
        }

        modes.iter().all(|mode| {
            self.grants
                .get(mode)
                .is_some_and(|grants| grants.matches(principals))
        })
    }

    /// Returns a new ACL with the given principals added to each mode.
    ///
    /// Set semantics deduplicate repeated names. Adding named principals
    /// to a grant that is already the sole wildcard is a no-op, since the
    /// grant is already universal.
    pub fn with_added(
        &self,
        modes: &[Permission],
        users: &[StringOrWildcard],
        groups: &[StringOrWildcard],
    ) -> Acl {
        let mut grants = self.grants.clone();
        for mode in modes {
            let entry = grants.entry(*mode).or_default();
            if !is_wildcard_only(&entry.users) {
                entry.users.extend(users.iter().cloned());
            }
            if !is_wildcard_only(&entry.groups) {
                entry.groups.extend(groups.iter().cloned());
            }
        }
        Acl { grants }
    }

    /// Returns a new ACL with the given principals removed from each mode.
    ///
    /// Removing named principals from a grant that is the sole wildcard
    /// is a no-op; the wildcard itself is only removed when it appears in
    /// the removal list. Modes left with no principals at all are dropped
    /// from the ACL.
    pub fn with_removed(
        &self,
        modes: &[Permission],
        users: &[StringOrWildcard],
        groups: &[StringOrWildcard],
    ) -> Acl {
        let mut grants = self.grants.clone();
        for mode in modes {
            let Some(entry) = grants.get_mut(mode) else {
                continue;
            };
            if !is_wildcard_only(&entry.users) || users.contains(&StringOrWildcard::Wildcard) {
                for user in users {
                    entry.users.remove(user);
                }
            }
            if !is_wildcard_only(&entry.groups) || groups.contains(&StringOrWildcard::Wildcard) {
                for group in groups {
                    entry.groups.remove(group);
                }
            }
            if entry.is_empty() {
                grants.remove(mode);
            }
        }
        Acl { grants }
    }

    /// Inverts the mode-to-principals map into a per-principal view.
    ///
    /// Principals referenced under multiple modes are merged into one
    /// record. Output order is stable: users before groups, sorted by
    /// name within each kind, modes in declaration order.
    pub fn flatten(&self) -> Vec<FlatPermission> {
        let mut users: BTreeMap<StringOrWildcard, Vec<Permission>> = BTreeMap::new();
        let mut groups: BTreeMap<StringOrWildcard, Vec<Permission>> = BTreeMap::new();

        for (mode, grants) in &self.grants {
            for user in &grants.users {
                users.entry(user.clone()).or_default().push(*mode);
            }
            for group in &grants.groups {
                groups.entry(group.clone()).or_default().push(*mode);
            }
        }

        let record = |principal_type| {
            move |(principal_name, mut permission_types): (StringOrWildcard, Vec<Permission>)| {
                permission_types.sort();
                FlatPermission {
                    principal_type,
                    principal_name,
                    permission_types,
                }
            }
        };

        users
            .into_iter()
            .map(record(PrincipalType::User))
            .chain(groups.into_iter().map(record(PrincipalType::Group)))
            .collect()
    }

    /// Builds the search filter matching documents the principals may access.
    ///
    /// The result matches documents whose `permissions.<mode>.users`
    /// contains one of the principals' users or the wildcard, or the
    /// analogous condition on groups, for *any* of the required modes.
    /// When `object_types` is given, a terms filter restricts results to
    /// those types. Empty modes or empty principals yield a query that
    /// matches nothing.
    pub fn query_dsl(
        modes: &[Permission],
        object_types: Option<&[String]>,
        principals: &Principals,
    ) -> QueryDsl {
        if modes.is_empty() || principals.is_empty() {
            return QueryDsl::MatchNone;
        }

        let mut should = Vec::new();
        for mode in modes {
            let users_field = format!("permissions.{mode}.users");
            let groups_field = format!("permissions.{mode}.groups");

            for user in &principals.users {
                should.push(QueryDsl::term(&users_field, user));
            }
            if !principals.users.is_empty() {
                should.push(QueryDsl::term(&users_field, "*"));
            }

            for group in &principals.groups {
                should.push(QueryDsl::term(&groups_field, group));
            }
            if !principals.groups.is_empty() {
                should.push(QueryDsl::term(&groups_field, "*"));
            }
        }

        let filter = match object_types {
            Some(types) => vec![QueryDsl::terms("type", types.to_vec())],
            None => Vec::new(),
        };

        QueryDsl::Bool(BoolQuery {
            should,
            filter,
            minimum_should_match: Some(1),
            ..Default::default()
        })
    }
}

fn is_wildcard_only(set: &std::collections::BTreeSet<StringOrWildcard>) -> bool {
    set.len() == 1 && set.contains(&StringOrWildcard::Wildcard)
}
