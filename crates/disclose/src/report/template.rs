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

//! Per-service section templates.
//!
//! Deliberately minimal: a template is plain text with `{{ dotted.path }}`
//! placeholders resolved against the service's JSON payload. This is not a
//! template language; anything richer belongs in a dedicated renderer.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::TemplateError;

const TEMPLATE_EXTENSION: &str = "tmpl";

/// Registered templates, keyed by service name.
///
/// Loaded once at startup alongside the service registry; read-only after
/// that.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, String>,
}

impl TemplateStore {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    /// Loads every `{service}.tmpl` file in a directory.
    ///
    /// Services without a template simply render as placeholders later; a
    /// missing directory is an error because it is always a deployment
    /// mistake.
    pub fn from_dir(dir: &Path) -> Result<Self, TemplateError> {
        let mut templates = HashMap::new();

        let entries = std::fs::read_dir(dir).map_err(|source| TemplateError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| TemplateError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            let Some(service) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path).map_err(|source| TemplateError::Read {
                path: path.clone(),
                source,
            })?;
            debug!(service, path = %path.display(), "Loaded service template");
            templates.insert(service.to_string(), content);
        }

        Ok(Self { templates })
    }

    pub fn contains(&self, service: &str) -> bool {
        self.templates.contains_key(service)
    }

    /// Renders the service's template against its payload.
    ///
    /// Placeholders that resolve to nothing render as empty text rather
    /// than failing: payload shape drift in one field must not suppress the
    /// rest of the section.
    pub fn render(&self, service: &str, payload: &Value) -> Result<String, TemplateError> {
        let template = self
            .templates
            .get(service)
            .ok_or_else(|| TemplateError::Missing {
                service: service.to_string(),
            })?;

        Ok(substitute(template, payload))
    }
}

fn substitute(template: &str, payload: &Value) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                output.push_str(&lookup(payload, path));
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated placeholder: emit literally.
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

fn lookup(payload: &Value, dotted_path: &str) -> String {
    let mut current = payload;
    for segment in dotted_path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
