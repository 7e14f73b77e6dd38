use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use savedstore_service::{SortOrder, WorkspaceListOptions};
use savedstore_types::acl::Acl;
use savedstore_types::object::{Workspace, WorkspaceAttributes};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::endpoints::SuccessResponse;
use crate::error::ApiResult;
use crate::extractors::Workspaces;
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/api/workspaces", routing::post(workspace_create))
        .route("/api/workspaces/_list", routing::post(workspace_list))
        .route(
            "/api/workspaces/{id}",
            routing::get(workspace_get)
                .put(workspace_update)
                .delete(workspace_delete),
        )
}

#[derive(Debug, Deserialize)]
struct IdPath {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WorkspaceBody {
    attributes: WorkspaceAttributes,
    #[serde(default)]
    permissions: Option<Acl>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListBody {
    search: Option<String>,
    search_fields: Option<Vec<String>>,
    page: usize,
    per_page: usize,
    sort_field: Option<String>,
    sort_order: SortOrder,
}

impl Default for ListBody {
    fn default() -> Self {
        Self {
            search: None,
            search_fields: None,
            page: 1,
            per_page: 20,
            sort_field: None,
            sort_order: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResult {
    workspaces: Vec<Workspace>,
    total: u64,
    per_page: usize,
    page: usize,
}

async fn workspace_create(
    Workspaces(service): Workspaces,
    Json(body): Json<WorkspaceBody>,
) -> ApiResult<impl IntoResponse> {
    let id = service.create(body.attributes, body.permissions).await?;
    let response = Json(SuccessResponse::new(json!({ "id": id })));
    Ok((StatusCode::OK, response))
}

async fn workspace_get(
    Workspaces(service): Workspaces,
    Path(IdPath { id }): Path<IdPath>,
) -> ApiResult<impl IntoResponse> {
    let workspace = service.get(&id).await?;
    Ok(Json(SuccessResponse::new(workspace)))
}

async fn workspace_update(
    Workspaces(service): Workspaces,
    Path(IdPath { id }): Path<IdPath>,
    Json(body): Json<WorkspaceBody>,
) -> ApiResult<impl IntoResponse> {
    service
        .update(&id, body.attributes, body.permissions)
        .await?;
    Ok(Json(SuccessResponse::new(true)))
}

async fn workspace_delete(
    Workspaces(service): Workspaces,
    Path(IdPath { id }): Path<IdPath>,
) -> ApiResult<impl IntoResponse> {
    service.delete(&id).await?;
    Ok(Json(SuccessResponse::new(true)))
}

async fn workspace_list(
    Workspaces(service): Workspaces,
    Json(body): Json<ListBody>,
) -> ApiResult<impl IntoResponse> {
    let mut options = WorkspaceListOptions {
        search: body.search,
        page: body.page,
        per_page: body.per_page,
        sort_field: body.sort_field,
        sort_order: body.sort_order,
        ..Default::default()
    };
    if let Some(search_fields) = body.search_fields {
        options.search_fields = search_fields;
    }

    let list = service.list(options).await?;
    Ok(Json(SuccessResponse::new(ListResult {
        workspaces: list.workspaces,
        total: list.total,
        per_page: list.per_page,
        page: list.page,
    })))
}
