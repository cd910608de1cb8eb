//! InMemoryBlobStore - 開発用の Blob ストレージ
//!
//! url（`s3://bucket/key`）をキーに JSON を保持します。

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::ports::{BlobError, BlobStore, parse_blob_url};

#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, Value>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_json(&self, document: &Value, url: &str) -> Result<(), BlobError> {
        parse_blob_url(url)?;
        self.objects
            .lock()
            .await
            .insert(url.to_string(), document.clone());
        Ok(())
    }

    async fn get_json(&self, url: &str) -> Result<Value, BlobError> {
        parse_blob_url(url)?;
        self.objects
            .lock()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(url.to_string()))
    }
}
