//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::qdrant::{
    VectorStore,
    payload::{build_payload, current_timestamp_rfc3339, file_filter, generate_point_id},
    types::{
        ChunkPoint, ListCollectionsResponse, QdrantError, QueryResponse, QueryResponseResult,
        ScoredPoint,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client from the vector index section of the configuration.
    pub fn new(config: &Config) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("docsearch/0.1")
            .timeout(config.http_timeout)
            .build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Retrieve the names of all collections present in Qdrant.
    pub async fn list_collections(&self) -> Result<Vec<String>, QdrantError> {
        let response = self.request(Method::GET, &["collections"])?.send().await?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse = response.json().await?;
            let names = payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect();
            Ok(names)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Failed to list collections");
            Err(error)
        }
    }

    /// Check whether a collection exists.
    pub async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &["collections", collection_name])?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    /// Create a collection with the specified vector size and cosine distance.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &["collections", collection_name])?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::info!(collection = collection_name, vector_size, "Collection created");
        })
        .await?;

        self.ensure_payload_indexes(collection_name).await
    }

    /// Ensure the `file_id` payload index exists so per-document filters stay cheap.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) -> Result<(), QdrantError> {
        let body = json!({
            "field_name": "file_id",
            "field_schema": "keyword",
        });

        let response = self
            .request(Method::PUT, &["collections", collection_name, "index"])?
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(collection = collection_name, "Payload index ensured");
        } else if response.status() == StatusCode::CONFLICT {
            tracing::debug!(collection = collection_name, "Payload index already exists");
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::warn!(collection = collection_name, error = %error, "Failed to ensure payload index");
        }

        Ok(())
    }

    /// Upload embedded chunks to the given collection, returning the number written.
    pub async fn index_points(
        &self,
        collection_name: &str,
        points: Vec<ChunkPoint>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_rfc3339();
        let serialized: Vec<_> = points
            .into_iter()
            .map(|point| {
                let payload = build_payload(&point, &now);
                json!({
                    "id": generate_point_id(),
                    "vector": point.vector,
                    "payload": payload,
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(Method::PUT, &["collections", collection_name, "points"])?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points indexed"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a similarity search against a collection, returning scored payloads.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let (Some(filter_value), Some(object)) = (filter, body.as_object_mut()) {
            object.insert("filter".into(), filter_value);
        }

        let response = self
            .request(
                Method::POST,
                &["collections", collection_name, "points", "query"],
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect();

        Ok(results)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = endpoint_url(&self.base_url, segments)?;
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantService {
    async fn list_indexes(&self) -> Result<Vec<String>, QdrantError> {
        self.list_collections().await
    }

    async fn index_exists(&self, name: &str) -> Result<bool, QdrantError> {
        self.collection_exists(name).await
    }

    async fn create_index(&self, name: &str, dimension: usize) -> Result<(), QdrantError> {
        self.create_collection(name, dimension as u64).await
    }

    async fn upsert_chunks(
        &self,
        name: &str,
        points: Vec<ChunkPoint>,
    ) -> Result<usize, QdrantError> {
        self.index_points(name, points).await
    }

    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        limit: usize,
        file_id: Option<&str>,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        self.search_points(name, vector, file_id.map(file_filter), limit)
            .await
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

/// Append `segments` to the base URL, percent-encoding each one as a single path segment.
fn endpoint_url(base: &str, segments: &[&str]) -> Result<reqwest::Url, QdrantError> {
    if let Some(segment) = segments
        .iter()
        .find(|segment| matches!(**segment, "" | "." | ".."))
    {
        return Err(QdrantError::InvalidCollectionName((*segment).to_string()));
    }
    let mut url = reqwest::Url::parse(base).map_err(|err| QdrantError::InvalidUrl(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| QdrantError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn service(server: &MockServer, api_key: Option<&str>) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("docsearch-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn search_points_emits_expected_request() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/query")
                    .json_body_partial(
                        r#"{"limit":3,"with_payload":true,"filter":{"must":[{"key":"file_id","match":{"value":"file-1"}}]}}"#,
                    );
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "point-1",
                                "score": 0.42,
                                "payload": {
                                    "text": "Example",
                                    "file_id": "file-1"
                                }
                            }
                        ]
                    }
                }));
            })
            .await;

        let results = service(&server, None)
            .search("demo", vec![0.1, 0.2], 3, Some("file-1"))
            .await
            .expect("search request");

        mock.assert_async().await;

        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.id, "point-1");
        assert!((hit.score - 0.42).abs() < f32::EPSILON);
        assert_eq!(hit.text(), Some("Example"));
    }

    #[tokio::test]
    async fn index_points_sends_payload_and_counts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .query_param("wait", "true")
                    .body_contains("\"file_id\":\"file-1\"");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let points = vec![
            ChunkPoint {
                file_id: "file-1".into(),
                chunk_index: 0,
                byte_offset: 0,
                text: "first".into(),
                vector: vec![1.0, 0.0],
            },
            ChunkPoint {
                file_id: "file-1".into(),
                chunk_index: 1,
                byte_offset: 6,
                text: "second".into(),
                vector: vec![0.0, 1.0],
            },
        ];

        let written = service(&server, None)
            .upsert_chunks("docs", points)
            .await
            .expect("upsert");
        mock.assert_async().await;
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn index_points_skips_empty_batches() {
        let server = MockServer::start_async().await;
        let written = service(&server, None)
            .index_points("docs", Vec::new())
            .await
            .expect("noop");
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn index_exists_maps_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/present");
                then.status(200).json_body(json!({ "status": "ok", "result": {} }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/absent");
                then.status(404).json_body(json!({ "status": { "error": "Not found" } }));
            })
            .await;

        let qdrant = service(&server, None);
        assert!(qdrant.index_exists("present").await.expect("lookup"));
        assert!(!qdrant.index_exists("absent").await.expect("lookup"));
    }

    #[tokio::test]
    async fn create_index_requests_cosine_collection_and_payload_index() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/file-1")
                    .header("api-key", "secret")
                    .json_body(json!({ "vectors": { "size": 8, "distance": "Cosine" } }));
                then.status(200).json_body(json!({ "status": "ok", "result": true }));
            })
            .await;
        let index = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/file-1/index");
                then.status(200).json_body(json!({ "status": "ok", "result": {} }));
            })
            .await;

        service(&server, Some("secret"))
            .create_index("file-1", 8)
            .await
            .expect("create");
        create.assert_async().await;
        index.assert_async().await;
    }

    #[test]
    fn endpoint_url_keeps_names_in_one_segment() {
        let url = endpoint_url("http://qdrant:6333/base", &["collections", "a/../b?c#d"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://qdrant:6333/base/collections/a%2F..%2Fb%3Fc%23d"
        );
        assert!(matches!(
            endpoint_url("http://qdrant:6333", &["collections", ".."]),
            Err(QdrantError::InvalidCollectionName(name)) if name == ".."
        ));
    }

    #[tokio::test]
    async fn traversal_in_collection_name_does_not_reach_other_collections() {
        let server = MockServer::start_async().await;
        let shared = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/microdocsearch");
                then.status(200).json_body(json!({ "status": "ok", "result": {} }));
            })
            .await;
        let listing = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections");
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "collections": [] } }));
            })
            .await;

        let qdrant = service(&server, None);
        let exists = qdrant
            .index_exists("someone-else/../microdocsearch")
            .await
            .expect("lookup");
        assert!(!exists);
        assert!(qdrant.index_exists("..").await.is_err());

        shared.assert_hits_async(0).await;
        listing.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn list_indexes_returns_collection_names() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "collections": [{ "name": "microdocsearch" }, { "name": "file-1" }] }
                }));
            })
            .await;

        let names = service(&server, None).list_indexes().await.expect("list");
        assert_eq!(names, vec!["microdocsearch", "file-1"]);
    }
}
