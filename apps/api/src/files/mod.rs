//! CV file store. CVs are referenced from the `cvs` table by their public
//! object URL; the bytes live in an S3-compatible bucket.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("Invalid file reference: {0}")]
    InvalidReference(String),

    #[error("S3 error: {0}")]
    S3(String),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn fetch(&self, file_ref: &str) -> Result<Bytes, FileStoreError>;
}

pub struct S3FileStore {
    client: S3Client,
    bucket: String,
}

impl S3FileStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn fetch(&self, file_ref: &str) -> Result<Bytes, FileStoreError> {
        let key = object_key(file_ref, &self.bucket)?;
        debug!("Fetching s3://{}/{}", self.bucket, key);

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| FileStoreError::S3(format!("get_object failed: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| FileStoreError::S3(format!("Failed to read object body: {e}")))?;

        Ok(data.into_bytes())
    }
}

/// Derives the object key from a CV reference.
///
/// Public URLs look like `https://host/storage/v1/object/public/<bucket>/<user>/<file>.pdf`;
/// everything after the `/<bucket>/` segment is the key. A reference without a
/// scheme is taken as a bare key.
pub fn object_key<'a>(file_ref: &'a str, bucket: &str) -> Result<&'a str, FileStoreError> {
    let file_ref = file_ref.trim();
    let marker = format!("/{bucket}/");

    let key = match file_ref.find(&marker) {
        Some(idx) => &file_ref[idx + marker.len()..],
        None if file_ref.contains("://") => {
            return Err(FileStoreError::InvalidReference(format!(
                "'{file_ref}' does not point into bucket '{bucket}'"
            )))
        }
        None => file_ref.trim_start_matches('/'),
    };

    if key.is_empty() {
        return Err(FileStoreError::InvalidReference(format!(
            "'{file_ref}' has an empty object key"
        )));
    }
    Ok(key)
}
