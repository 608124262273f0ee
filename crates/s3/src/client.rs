//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from aliasman-core
//! for a single bucket.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_smithy_types::byte_stream::ByteStream;

use aliasman_core::config::{S3Config, require};
use aliasman_core::{Error, ListResult, ObjectData, ObjectInfo, ObjectStore, Result};

/// S3 client bound to the alias bucket
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from the provider configuration
    pub async fn new(config: &S3Config) -> Result<Self> {
        let access_key = require(&config.access_key, "s3.access_key")?;
        let secret_key = require(&config.secret_key, "s3.secret_key")?;
        let bucket = require(&config.bucket, "s3.bucket")?;
        let region = require(&config.region, "s3.region")?;

        let credentials = aws_credential_types::Credentials::new(
            access_key,
            secret_key,
            None, // session token
            None, // expiry
            "aliasman-static-credentials",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(region.to_string()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints are usually S3-compatible servers without
        // virtual-host bucket addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: bucket.to_string(),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn timestamp(dt: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(dt.secs(), dt.subsec_nanos() as i32).ok()
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn lowercase_keys(metadata: Option<&HashMap<String, String>>) -> HashMap<String, String> {
    metadata
        .into_iter()
        .flatten()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect()
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects(
        &self,
        max_keys: i32,
        continuation_token: Option<String>,
    ) -> Result<ListResult> {
        let mut request = self
            .inner
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(max_keys);

        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let items = response
            .contents()
            .iter()
            .map(|object| ObjectInfo {
                key: object.key().unwrap_or_default().to_string(),
                last_modified: object.last_modified().and_then(timestamp),
                etag: object.e_tag().map(trim_etag),
            })
            .collect();

        Ok(ListResult {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn head_object(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        let result = self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(response) => Ok(Some(lowercase_keys(response.metadata()))),
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    Ok(None)
                } else {
                    Err(Error::Network(e.to_string()))
                }
            }
        }
    }

    async fn get_object(&self, key: &str) -> Result<Option<ObjectData>> {
        let result = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(Error::Network(e.to_string()));
            }
        };

        let etag = response.e_tag().map(trim_etag);
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(Some(ObjectData { body, etag }))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(())
    }
}
