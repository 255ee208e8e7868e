use crate::{ObjectMeta, ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use aws_sdk_s3::Client;

/// S3-compatible backend. Credentials and endpoint resolution are
/// whatever `aws-config` picks up from the environment (this is the
/// "sole boundary at which credentials... matter" the spec calls out
/// — nothing above this module ever sees a key or a region).
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn new(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self {
            client: Client::new(&config),
            bucket: bucket.into(),
        }
    }

    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let mut keys = Vec::new();
        let mut continuation = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(classify_list)?;
            for obj in resp.contents() {
                if let Some(key) = obj.key() {
                    keys.push(key.to_string());
                }
            }
            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_get)?;
        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Retryable(e.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(bytes.into())
            .send()
            .await
            .map_err(|e| ObjectStoreError::Retryable(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Retryable(e.to_string()))?;
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_head)?;
        Ok(ObjectMeta {
            size: resp.content_length().unwrap_or(0).max(0) as u64,
            etag: resp.e_tag().unwrap_or_default().to_string(),
        })
    }
}

fn classify_get(
    err: aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::get_object::GetObjectError>,
) -> ObjectStoreError {
    use aws_sdk_s3::operation::get_object::GetObjectError;
    match err.as_service_error() {
        Some(GetObjectError::NoSuchKey(_)) => ObjectStoreError::Terminal("no such key".into()),
        _ => ObjectStoreError::Retryable(err.to_string()),
    }
}

fn classify_head(
    err: aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::head_object::HeadObjectError>,
) -> ObjectStoreError {
    use aws_sdk_s3::operation::head_object::HeadObjectError;
    match err.as_service_error() {
        Some(HeadObjectError::NotFound(_)) => ObjectStoreError::Terminal("not found".into()),
        _ => ObjectStoreError::Retryable(err.to_string()),
    }
}

fn classify_list(
    err: aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error>,
) -> ObjectStoreError {
    match err.raw_response().map(|r| r.status().as_u16()) {
        Some(403) | Some(401) => ObjectStoreError::Terminal(err.to_string()),
        _ => ObjectStoreError::Retryable(err.to_string()),
    }
}
