// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Report Archive Infrastructure
//!
//! Concrete implementations of [`ReportArchive`]:
//!
//! - [`OpenDalReportArchive`] over an OpenDAL operator (S3 in production,
//!   memory for development runs)
//! - [`MockReportArchive`] for tests, with failure injection

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use opendal::{services, Operator};
use tracing::debug;

use crate::domain::config::{resolve_secret, StorageConfig};
use crate::domain::storage::{ReportArchive, StorageError};

/// Archive backed by any OpenDAL operator.
#[derive(Clone)]
pub struct OpenDalReportArchive {
    operator: Operator,
}

impl OpenDalReportArchive {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// S3 (or S3-compatible) bucket from configuration.
    pub fn s3(config: &StorageConfig) -> Result<Self, StorageError> {
        let bucket = config
            .bucket
            .as_deref()
            .ok_or_else(|| StorageError::Config("storage.bucket is not set".to_string()))?;

        let mut builder = services::S3::default().bucket(bucket);
        if let Some(region) = &config.region {
            builder = builder.region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(access_key_id) = &config.access_key_id {
            builder = builder.access_key_id(access_key_id);
        }
        if let Some(secret) = &config.secret_access_key {
            let secret = resolve_secret(secret).map_err(|e| StorageError::Config(e.to_string()))?;
            builder = builder.secret_access_key(&secret);
        }

        let operator = Operator::new(builder)?.finish();
        Ok(Self::new(operator))
    }

    /// Process-local archive for development runs and tests.
    pub fn memory() -> Result<Self, StorageError> {
        let operator = Operator::new(services::Memory::default())?.finish();
        Ok(Self::new(operator))
    }
}

#[async_trait]
impl ReportArchive for OpenDalReportArchive {
    async fn put(&self, key: &str, body: Vec<u8>, metadata: HashMap<String, String>) -> Result<(), StorageError> {
        let size = body.len();
        if !metadata.is_empty() && self.operator.info().full_capability().write_with_user_metadata {
            self.operator.write_with(key, body).user_metadata(metadata).await?;
        } else {
            self.operator.write(key, body).await?;
        }
        debug!(key = %key, size, "Stored report object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let buffer = self.operator.read(key).await?;
        Ok(buffer.to_vec())
    }
}

/// Stored object as seen by [`MockReportArchive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

/// In-memory archive recording every write, with switchable failures.
#[derive(Clone, Default)]
pub struct MockReportArchive {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    fail_puts: Arc<Mutex<bool>>,
}

impl MockReportArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `put` calls fail (or succeed again).
    pub fn set_fail_puts(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_puts.lock() {
            *flag = fail;
        }
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().ok().and_then(|objects| objects.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReportArchive for MockReportArchive {
    async fn put(&self, key: &str, body: Vec<u8>, metadata: HashMap<String, String>) -> Result<(), StorageError> {
        let fail = self
            .fail_puts
            .lock()
            .map_err(|_| StorageError::Backend("Mutex poisoned".to_string()))?;
        if *fail {
            return Err(StorageError::Backend(format!("Injected failure writing {}", key)));
        }
        drop(fail);

        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Backend("Mutex poisoned".to_string()))?;
        objects.insert(key.to_string(), StoredObject { body, metadata });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Backend("Mutex poisoned".to_string()))?;
        objects
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_archive_round_trip() {
        let archive = OpenDalReportArchive::memory().unwrap();
        let metadata = HashMap::from([("scanProfileToken".to_string(), "tok".to_string())]);
        archive.put("tok_1.json", br#"{"cvss":1.0}"#.to_vec(), metadata).await.unwrap();

        assert_eq!(archive.get("tok_1.json").await.unwrap(), br#"{"cvss":1.0}"#.to_vec());
        assert!(matches!(archive.get("missing.json").await, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_s3_requires_bucket() {
        let result = OpenDalReportArchive::s3(&StorageConfig::default());
        assert!(matches!(result, Err(StorageError::Config(_))));
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let archive = MockReportArchive::new();
        archive.set_fail_puts(true);
        assert!(archive.put("k", vec![1], HashMap::new()).await.is_err());

        archive.set_fail_puts(false);
        archive.put("k", vec![1], HashMap::new()).await.unwrap();
        assert_eq!(archive.keys(), vec!["k".to_string()]);
    }
}
