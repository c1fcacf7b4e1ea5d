// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Report Archive Trait - Anti-Corruption Layer for object storage
//!
//! Full scan reports are archived once a scan completes so they remain
//! available after the provider-side profile is deleted. The archive is
//! keyed by `{provider_token}_{epoch_millis}.json` and the key is stored
//! on the profile.
//!
//! Follows the same adapter split as the repositories: the domain owns the
//! trait, `crate::infrastructure::storage` provides the OpenDAL-backed and
//! in-memory implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Object storage for archived scan reports
#[async_trait]
pub trait ReportArchive: Send + Sync {
    /// Store a report document
    ///
    /// # Arguments
    /// * `key` - Object key (e.g., "tok_1700000000000.json")
    /// * `body` - Serialized report
    /// * `metadata` - User metadata attached to the object where supported
    ///
    /// # Returns
    /// * `Ok(())` if the object was written
    /// * `Err(StorageError)` if the write failed
    async fn put(&self, key: &str, body: Vec<u8>, metadata: HashMap<String, String>) -> Result<(), StorageError>;

    /// Read a previously archived report
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - The stored bytes
    /// * `Err(StorageError::NotFound)` if no object exists under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend misconfigured: {0}")]
    Config(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => StorageError::NotFound(err.to_string()),
            opendal::ErrorKind::ConfigInvalid => StorageError::Config(err.to_string()),
            _ => StorageError::Backend(err.to_string()),
        }
    }
}
