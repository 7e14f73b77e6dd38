//! OpenSearch-compatible remote backend.
//!
//! Documents are stored in a single index, keyed `{type}:{id}`, with the
//! serialized [`SavedObject`] as the source. Searches send the
//! [`QueryDsl`](savedstore_types::query::QueryDsl) rendered to the
//! engine's JSON query language, so authorization predicates are applied
//! by the engine itself and unauthorized documents are never returned.

use reqwest::StatusCode;
use savedstore_types::object::{SavedObject, SavedObjectRef};
use serde::Deserialize;
use serde_json::json;

use super::{Backend, BackendError, SearchRequest, SearchResponse, SortOrder};

/// A backend talking to an OpenSearch-compatible REST API.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl RemoteBackend {
    /// Creates a backend for the given endpoint and index name.
    pub fn new(base_url: &str, index: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            index: index.to_owned(),
        }
    }

    fn doc_url(&self, ty: &str, id: &str) -> String {
        format!("{}/{}/_doc/{ty}:{id}", self.base_url, self.index)
    }
}

#[derive(Debug, Deserialize)]
struct GetDocResponse {
    found: bool,
    #[serde(rename = "_source")]
    source: Option<SavedObject>,
}

#[derive(Debug, Deserialize)]
struct MgetResponse {
    docs: Vec<GetDocResponse>,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    total: SearchTotal,
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchTotal {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: SavedObject,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    hits: SearchHits,
}

async fn unexpected_status(response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    BackendError::UnexpectedStatus { status, body }
}

#[async_trait::async_trait]
impl Backend for RemoteBackend {
    async fn index(&self, object: &SavedObject, overwrite: bool) -> Result<(), BackendError> {
        let mut url = self.doc_url(&object.ty, &object.id);
        if !overwrite {
            url.push_str("?op_type=create");
        }

        let response = self.client.put(&url).json(object).send().await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(BackendError::Conflict(format!(
                "{}:{}",
                object.ty, object.id
            ))),
            _ => Err(unexpected_status(response).await),
        }
    }

    async fn get(&self, ty: &str, id: &str) -> Result<Option<SavedObject>, BackendError> {
        let response = self.client.get(self.doc_url(ty, id)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let doc: GetDocResponse = response.json().await?;
                Ok(doc.source)
            }
            _ => Err(unexpected_status(response).await),
        }
    }

    async fn bulk_get(
        &self,
        refs: &[SavedObjectRef],
    ) -> Result<Vec<Option<SavedObject>>, BackendError> {
        let ids: Vec<String> = refs.iter().map(|r| format!("{}:{}", r.ty, r.id)).collect();
        let url = format!("{}/{}/_mget", self.base_url, self.index);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "ids": ids }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }

        let body: MgetResponse = response.json().await?;
        Ok(body
            .docs
            .into_iter()
            .map(|doc| if doc.found { doc.source } else { None })
            .collect())
    }

    async fn delete(&self, ty: &str, id: &str) -> Result<bool, BackendError> {
        let response = self.client.delete(self.doc_url(ty, id)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(unexpected_status(response).await),
        }
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
        let page = request.page.max(1);
        let mut body = json!({
            "query": request.query,
            "from": (page - 1) * request.per_page,
            "size": request.per_page,
        });
        if let Some(field) = &request.sort_field {
            let order = match request.sort_order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            body["sort"] = json!([ { field: { "order": order } } ]);
        }

        let url = format!("{}/{}/_search", self.base_url, self.index);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }

        let raw: RawSearchResponse = response.json().await?;
        Ok(SearchResponse {
            hits: raw.hits.hits.into_iter().map(|h| h.source).collect(),
            total: raw.hits.total.value,
        })
    }
}
