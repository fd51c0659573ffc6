//! S3-compatible object store client (MinIO, LocalStack, AWS) using path-style addressing.

use super::sigv4::{SigningCredentials, presign_query, sign_request, uri_encode};
use super::{ObjectInfo, ObjectStore, StorageError};
use crate::config::Config;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode, Url, header};
use std::time::Duration;
use time::OffsetDateTime;

/// Longest lifetime S3 accepts for a presigned URL.
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

/// HTTP client for a single bucket of an S3-compatible store.
pub struct MinioStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) host: String,
    pub(crate) bucket: String,
    pub(crate) credentials: SigningCredentials,
}

impl MinioStore {
    /// Construct a client from the storage section of the configuration.
    pub fn new(config: &Config) -> Result<Self, StorageError> {
        let client = Client::builder()
            .user_agent("docsearch/0.1")
            .timeout(config.http_timeout)
            .build()?;
        let (base_url, host) = parse_endpoint(&config.minio_endpoint)?;
        tracing::debug!(
            endpoint = %base_url,
            bucket = %config.storage_bucket,
            region = %config.minio_region,
            "Initialized object storage client"
        );

        Ok(Self {
            client,
            base_url,
            host,
            bucket: config.storage_bucket.clone(),
            credentials: SigningCredentials {
                access_key: config.minio_access_key.clone(),
                secret_key: config.minio_secret_key.clone(),
                region: config.minio_region.clone(),
            },
        })
    }

    fn bucket_path(&self) -> String {
        format!("/{}", uri_encode(&self.bucket))
    }

    fn object_path(&self, key: &str) -> String {
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        format!("/{}/{encoded_key}", uri_encode(&self.bucket))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        let signed = sign_request(
            &self.credentials,
            method.as_str(),
            &self.host,
            path,
            &body,
            OffsetDateTime::now_utc(),
        );

        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(header::AUTHORIZATION, signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256);
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }

        Ok(request.body(body).send().await?)
    }

    async fn unexpected(response: reqwest::Response) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StorageError::UnexpectedStatus { status, body }
    }
}

#[async_trait]
impl ObjectStore for MinioStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        let path = self.bucket_path();
        let response = self.send(Method::HEAD, &path, Bytes::new(), None).await?;
        match response.status() {
            status if status.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            _ => {
                let error = Self::unexpected(response).await;
                tracing::error!(bucket = %self.bucket, error = %error, "Bucket lookup failed");
                return Err(error);
            }
        }

        tracing::info!(bucket = %self.bucket, "Creating bucket");
        let response = self.send(Method::PUT, &path, Bytes::new(), None).await?;
        // A concurrent request may have created the bucket in between.
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            Ok(())
        } else {
            let error = Self::unexpected(response).await;
            tracing::error!(bucket = %self.bucket, error = %error, "Bucket creation failed");
            Err(error)
        }
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = data.len();
        let response = self
            .send(Method::PUT, &self.object_path(key), data, Some(content_type))
            .await?;

        if response.status().is_success() {
            tracing::debug!(bucket = %self.bucket, key, size, content_type, "Object stored");
            Ok(())
        } else {
            let error = Self::unexpected(response).await;
            tracing::error!(bucket = %self.bucket, key, error = %error, "Object upload failed");
            Err(error)
        }
    }

    async fn stat_object(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError> {
        let response = self
            .send(Method::HEAD, &self.object_path(key), Bytes::new(), None)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let headers = response.headers();
                let text_header = |name: header::HeaderName| {
                    headers
                        .get(name)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string)
                };
                Ok(Some(ObjectInfo {
                    key: key.to_string(),
                    size: text_header(header::CONTENT_LENGTH).and_then(|value| value.parse().ok()),
                    content_type: text_header(header::CONTENT_TYPE),
                    etag: text_header(header::ETAG).map(|tag| tag.trim_matches('"').to_string()),
                }))
            }
            _ => {
                let error = Self::unexpected(response).await;
                tracing::error!(bucket = %self.bucket, key, error = %error, "Object lookup failed");
                Err(error)
            }
        }
    }

    fn presigned_get_url(&self, key: &str, ttl: Duration) -> String {
        let path = self.object_path(key);
        let expires = ttl.as_secs().clamp(1, MAX_PRESIGN_SECS);
        let query = presign_query(
            &self.credentials,
            &self.host,
            &path,
            expires,
            OffsetDateTime::now_utc(),
        );
        format!("{}{path}?{query}", self.base_url)
    }
}

/// Split an endpoint into a base URL without trailing slash and the `host[:port]` used for signing.
fn parse_endpoint(endpoint: &str) -> Result<(String, String), StorageError> {
    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };
    let parsed =
        Url::parse(&candidate).map_err(|err| StorageError::InvalidEndpoint(err.to_string()))?;
    let host_name = parsed
        .host_str()
        .ok_or_else(|| StorageError::InvalidEndpoint(format!("missing host in {endpoint}")))?;
    let host = match parsed.port() {
        Some(port) => format!("{host_name}:{port}"),
        None => host_name.to_string(),
    };
    Ok((format!("{}://{host}", parsed.scheme()), host))
}

#[cfg(test)]
impl MinioStore {
    pub(crate) fn for_tests(base_url: &str, bucket: &str) -> Self {
        let (base_url, host) = parse_endpoint(base_url).expect("endpoint");
        Self {
            client: Client::builder()
                .user_agent("docsearch-test")
                .build()
                .expect("client"),
            base_url,
            host,
            bucket: bucket.to_string(),
            credentials: SigningCredentials {
                access_key: "minioadmin".into(),
                secret_key: "minioadmin".into(),
                region: "us-east-1".into(),
            },
        }
    }
}
