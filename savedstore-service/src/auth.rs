//! The request authorization context.
//!
//! `AuthContext` encapsulates the resolved identity claims of a request
//! together with the workspace the request is scoped to. It is
//! constructed once at the transport boundary and passed explicitly into
//! every service call; nothing in this crate reaches back into the
//! request object.

use std::time::{SystemTime, UNIX_EPOCH};

use savedstore_types::principal::{Principals, StringOrWildcard};
use serde::{Deserialize, Serialize};

/// The authentication state attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// No authentication interceptor is active in this deployment.
    ///
    /// Callers in this state carry an empty principal set, which
    /// downstream checks treat as unrestricted access. This "open" mode
    /// is intentional and must be preserved.
    Disabled,

    /// An authentication interceptor resolved the request's identity.
    Authenticated {
        /// The authenticated user name, if one was resolved.
        user_name: Option<String>,
        /// Backend roles (groups) attached to the identity.
        backend_roles: Vec<String>,
    },
}

/// The identity and workspace scope of a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    /// The request's authentication state.
    pub auth: AuthState,

    /// The workspace ID parsed from the request path, if any.
    pub workspace_id: Option<String>,
}

impl AuthContext {
    /// A context for a deployment without an authentication interceptor.
    pub fn disabled() -> Self {
        Self {
            auth: AuthState::Disabled,
            workspace_id: None,
        }
    }

    /// A context for an authenticated request.
    pub fn authenticated(user_name: Option<String>, backend_roles: Vec<String>) -> Self {
        Self {
            auth: AuthState::Authenticated {
                user_name,
                backend_roles,
            },
            workspace_id: None,
        }
    }

    /// Sets the ambient workspace parsed from the request path.
    pub fn in_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    /// Derives the principal set for this request.
    ///
    /// With authentication disabled this is empty. An authenticated
    /// request that carries no recognizable identity (no user name and
    /// no backend roles) is given a single-use, time-stamped fake user
    /// ID instead, so it matches nothing and is denied by default.
    pub fn principals(&self) -> Principals {
        match &self.auth {
            AuthState::Disabled => Principals::default(),
            AuthState::Authenticated {
                user_name,
                backend_roles,
            } => {
                if user_name.is_none() && backend_roles.is_empty() {
                    return Principals::from_user(fake_user_id());
                }

                Principals {
                    users: user_name.iter().cloned().collect(),
                    groups: backend_roles.iter().cloned().collect(),
                }
            }
        }
    }
}

fn fake_user_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("_fake_user_{millis}")
}

/// Principals that bypass all authorization checks.
///
/// The list is delivered over a configuration stream; until the first
/// value arrives the default is "no dashboard admins". The wildcard
/// entry makes every authenticated principal of that kind an admin.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DashboardAdmins {
    /// User names with admin bypass.
    #[serde(default)]
    pub users: Vec<StringOrWildcard>,

    /// Group (backend role) names with admin bypass.
    #[serde(default)]
    pub groups: Vec<StringOrWildcard>,
}

impl DashboardAdmins {
    /// Whether the given principals are dashboard admins.
    pub fn matches(&self, principals: &Principals) -> bool {
        let user_match = (!principals.users.is_empty()
            && self.users.contains(&StringOrWildcard::Wildcard))
            || principals
                .users
                .iter()
                .any(|u| self.users.contains(&StringOrWildcard::String(u.clone())));

        let group_match = (!principals.groups.is_empty()
            && self.groups.contains(&StringOrWildcard::Wildcard))
            || principals
                .groups
                .iter()
                .any(|g| self.groups.contains(&StringOrWildcard::String(g.clone())));

        user_match || group_match
    }
}
