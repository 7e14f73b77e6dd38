use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use savedstore_service::{FindOptions, NewSavedObject, SortOrder};
use savedstore_types::acl::Acl;
use savedstore_types::object::{SavedObject, SavedObjectRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoints::SuccessResponse;
use crate::error::ApiResult;
use crate::extractors::Client;
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route(
            "/api/saved_objects/_bulk_get",
            routing::post(saved_object_bulk_get),
        )
        .route("/api/saved_objects/_find", routing::post(saved_object_find))
        .route("/api/saved_objects/{type}", routing::post(saved_object_create))
        .route(
            "/api/saved_objects/{type}/{id}",
            routing::get(saved_object_get).delete(saved_object_delete),
        )
}

#[derive(Debug, Deserialize)]
struct TypePath {
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
struct TypeIdPath {
    #[serde(rename = "type")]
    ty: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    #[serde(default)]
    id: Option<String>,
    attributes: Value,
    #[serde(default)]
    permissions: Option<Acl>,
    /// Absent means "inherit the ambient workspace"; an explicit empty
    /// list opts out of workspace assignment.
    #[serde(default)]
    workspaces: Option<Vec<String>>,
    #[serde(default)]
    overwrite: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FindBody {
    types: Vec<String>,
    search: Option<String>,
    search_fields: Option<Vec<String>>,
    workspaces: Option<Vec<String>>,
    page: usize,
    per_page: usize,
    sort_field: Option<String>,
    sort_order: SortOrder,
}

impl Default for FindBody {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            search: None,
            search_fields: None,
            workspaces: None,
            page: 1,
            per_page: 20,
            sort_field: None,
            sort_order: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindResult {
    saved_objects: Vec<SavedObject>,
    total: u64,
    per_page: usize,
    page: usize,
}

async fn saved_object_create(
    Client(client): Client,
    Path(TypePath { ty }): Path<TypePath>,
    Json(body): Json<CreateBody>,
) -> ApiResult<impl IntoResponse> {
    let object = NewSavedObject {
        ty,
        id: body.id,
        attributes: body.attributes,
        permissions: body.permissions,
        workspaces: body.workspaces,
    };
    let created = client.create(object, body.overwrite).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(created))))
}

async fn saved_object_get(
    Client(client): Client,
    Path(TypeIdPath { ty, id }): Path<TypeIdPath>,
) -> ApiResult<impl IntoResponse> {
    let object = client.get(&ty, &id).await?;
    Ok(Json(SuccessResponse::new(object)))
}

async fn saved_object_delete(
    Client(client): Client,
    Path(TypeIdPath { ty, id }): Path<TypeIdPath>,
) -> ApiResult<impl IntoResponse> {
    client.delete(&ty, &id).await?;
    Ok(Json(SuccessResponse::new(true)))
}

async fn saved_object_bulk_get(
    Client(client): Client,
    Json(refs): Json<Vec<SavedObjectRef>>,
) -> ApiResult<impl IntoResponse> {
    let objects = client.bulk_get(refs).await?;
    Ok(Json(SuccessResponse::new(objects)))
}

async fn saved_object_find(
    Client(client): Client,
    Json(body): Json<FindBody>,
) -> ApiResult<impl IntoResponse> {
    let mut options = FindOptions {
        types: body.types,
        search: body.search,
        workspaces: body.workspaces,
        page: body.page,
        per_page: body.per_page,
        sort_field: body.sort_field,
        sort_order: body.sort_order,
        ..Default::default()
    };
    if let Some(search_fields) = body.search_fields {
        options.search_fields = search_fields;
    }

    let response = client.find(options).await?;
    Ok(Json(SuccessResponse::new(FindResult {
        saved_objects: response.saved_objects,
        total: response.total,
        per_page: response.per_page,
        page: response.page,
    })))
}
