//! BlobStore port - Blob ストレージ（S3 互換）
//!
//! 用途:
//! - 実行入力の正本（`{id}/input.json`）の保存
//! - inline 上限を超えた payload の退避

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid blob url: {0}")]
    InvalidUrl(String),

    #[error("blob content is not valid JSON: {0}")]
    Serialization(String),

    #[error("blob store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_json(&self, document: &Value, url: &str) -> Result<(), BlobError>;

    async fn get_json(&self, url: &str) -> Result<Value, BlobError>;
}

/// Split `s3://bucket/key` into `(bucket, key)`.
pub fn parse_blob_url(url: &str) -> Result<(&str, &str), BlobError> {
    let rest = url
        .strip_prefix("s3://")
        .ok_or_else(|| BlobError::InvalidUrl(url.to_string()))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(BlobError::InvalidUrl(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_key() {
        assert_eq!(
            parse_blob_url("s3://payloads/a/workflow-b/c/input.json").unwrap(),
            ("payloads", "a/workflow-b/c/input.json")
        );
    }

    #[test]
    fn rejects_other_schemes_and_empty_parts() {
        for url in ["https://x/y", "s3://bucket", "s3:///key", "s3://bucket/"] {
            assert_eq!(parse_blob_url(url), Err(BlobError::InvalidUrl(url.into())));
        }
    }
}
