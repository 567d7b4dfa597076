/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Artifact storage for composed reports.
//!
//! The pipeline hands the composed byte stream to an [`ArtifactStore`] and
//! records the returned reference on the request. The store is an external
//! collaborator; failures surface as [`ArtifactError`] and are not retried
//! by the composer.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::error::ArtifactError;

/// Pluggable artifact storage backend.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores the bytes under `key` and returns an opaque reference.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, ArtifactError>;

    /// Retrieves a previously stored artifact.
    async fn get(&self, reference: &str) -> Result<Vec<u8>, ArtifactError>;
}

/// Filesystem-backed artifact store.
///
/// References are paths relative to the root directory; keys may contain
/// `/` separators, which become subdirectories.
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, ArtifactError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        info!(reference = %key, "Stored report artifact");
        Ok(key.to_string())
    }

    async fn get(&self, reference: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.root.join(reference);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ArtifactError::NotFound {
                reference: reference.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
