//! Request extractors binding the access-control layer to HTTP.
//!
//! Identity arrives from the fronting authentication proxy via trusted
//! headers; verifying those identities is the proxy's job, not ours.
//! The ambient workspace is parsed from the request path, which mounts
//! every API route both at the root and under `/w/{workspace_id}`.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use savedstore_service::{AccessAwareRepository, AuthContext, AuthState, WorkspaceService};

use crate::state::ServiceState;

/// Header carrying the authenticated user name.
const USER_HEADER: &str = "x-auth-user";

/// Header carrying the authenticated backend roles, comma separated.
const GROUPS_HEADER: &str = "x-auth-groups";

/// Extracts the request's [`AuthContext`].
///
/// With authentication disabled the context is the open-mode one; an
/// enabled interceptor that forwarded no identity yields an
/// authenticated-but-anonymous context, which downstream checks deny by
/// default.
#[derive(Debug)]
pub struct Ctx(pub AuthContext);

impl FromRequestParts<ServiceState> for Ctx {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let auth = if state.config.auth.enabled {
            let user_name = header_value(parts, USER_HEADER);
            let backend_roles = header_value(parts, GROUPS_HEADER)
                .map(|groups| {
                    groups
                        .split(',')
                        .map(str::trim)
                        .filter(|role| !role.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();
            AuthState::Authenticated {
                user_name,
                backend_roles,
            }
        } else {
            AuthState::Disabled
        };

        Ok(Ctx(AuthContext {
            auth,
            workspace_id: workspace_from_path(parts.uri.path()),
        }))
    }
}

/// Extracts an access-controlled client bound to the request.
#[derive(Debug)]
pub struct Client(pub AccessAwareRepository);

impl FromRequestParts<ServiceState> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let Ctx(context) = Ctx::from_request_parts(parts, state).await?;
        Ok(Client(state.access.client(context)))
    }
}

/// Extracts a per-request [`WorkspaceService`].
#[derive(Debug)]
pub struct Workspaces(pub WorkspaceService);

impl FromRequestParts<ServiceState> for Workspaces {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let Client(client) = Client::from_request_parts(parts, state).await?;
        Ok(Workspaces(WorkspaceService::new(
            client,
            state.access.repository().clone(),
        )))
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Parses the ambient workspace ID from a `/w/{workspace_id}/...` path.
fn workspace_from_path(path: &str) -> Option<String> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    match (segments.next(), segments.next()) {
        (Some("w"), Some(workspace_id)) => Some(workspace_id.to_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_from_path() {
        assert_eq!(
            workspace_from_path("/w/alpha/api/saved_objects/_find"),
            Some("alpha".to_owned())
        );
        assert_eq!(workspace_from_path("/api/workspaces"), None);
        assert_eq!(workspace_from_path("/w"), None);
        assert_eq!(workspace_from_path("/west/api"), None);
    }
}
