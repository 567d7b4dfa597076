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

//! Downstream service registry.
//!
//! A static catalogue of the case-management services queried for each
//! request, loaded once at process start and immutable thereafter. Ordering
//! is significant: `display_order` defines the order sections appear in the
//! final report, so iteration is always sorted.

use serde::Deserialize;
use std::path::Path;

use crate::error::RegistryError;

/// One downstream service.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Stable service name, used for summaries, templates and section
    /// headings.
    pub name: String,
    /// Base URL the subject-access query is issued against.
    pub base_url: String,
    /// Position of this service's section in the composed report.
    pub display_order: i32,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    service: Vec<ServiceEntry>,
}

/// Ordered, read-only catalogue of downstream services.
///
/// Construction fails fast on blank names/URLs, duplicate names, or an empty
/// catalogue; after that no locking is needed since the registry is never
/// mutated.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: Vec<ServiceEntry>,
}

impl ServiceRegistry {
    /// Builds a registry from entries, validating and sorting by
    /// `display_order`.
    pub fn new(mut services: Vec<ServiceEntry>) -> Result<Self, RegistryError> {
        if services.is_empty() {
            return Err(RegistryError::Empty);
        }
        for (index, entry) in services.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(RegistryError::MissingName { index });
            }
            if entry.base_url.trim().is_empty() {
                return Err(RegistryError::MissingUrl {
                    name: entry.name.clone(),
                });
            }
        }
        services.sort_by_key(|entry| entry.display_order);
        let mut names: Vec<&str> = services.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(RegistryError::DuplicateName {
                name: dup[0].to_string(),
            });
        }

        Ok(Self { services })
    }

    /// Loads the registry from a TOML file of `[[service]]` tables.
    pub fn from_toml_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: RegistryFile = toml::from_str(&content)?;
        Self::new(parsed.service)
    }

    /// Services in display order.
    pub fn services(&self) -> &[ServiceEntry] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
