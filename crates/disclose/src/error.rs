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

//! Error taxonomy for the fulfilment pipeline.
//!
//! Per-service failures (transient, permanent, auth) are carried as data in
//! [`QueryOutcome`](crate::client::QueryOutcome) and never abort a request.
//! The error types here cover everything else: storage, registry loading,
//! template resolution, report rendering, artifact I/O, and request-level
//! pipeline aborts.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the request store (DAL operations).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Request {id} not found")]
    NotFound { id: Uuid },

    /// A complete/fail/reclaim call arrived while the request was not in the
    /// state the caller believed it held. Always a contract violation,
    /// surfaced to the caller, never swallowed.
    #[error("Invalid transition for request {id}: expected {expected}, operation lost or out of turn")]
    InvalidTransition { id: Uuid, expected: String },

    /// Intake rejection: a request for the same subject locator, date window
    /// and version already exists.
    #[error("Duplicate request: subject already registered for this window under version {version}")]
    DuplicateRequest { version: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stored row could not be decoded: {0}")]
    Corrupt(String),
}

/// Errors raised while loading the downstream service registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read service registry {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse service registry: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Service registry entry {index} is missing a name")]
    MissingName { index: usize },

    #[error("Service '{name}' is missing a base URL")]
    MissingUrl { name: String },

    #[error("Service '{name}' is registered more than once")]
    DuplicateName { name: String },

    #[error("Service registry contains no services")]
    Empty,
}

/// A per-service template could not be resolved or applied.
///
/// Never fatal: the composer logs it and renders a placeholder section.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("No template registered for service '{service}'")]
    Missing { service: String },

    #[error("Failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The composed document was degenerate. Fails the whole request.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Composed report for case {case_reference} has zero pages")]
    EmptyDocument { case_reference: String },
}

/// Artifact store failures. Not retried by the composer.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact {reference} not found")]
    NotFound { reference: String },
}

/// Request-level failures that abort the current claim and transition the
/// request to Failed, leaving it for manual reclaim.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("{failed} of {total} services failed, exceeding the failure threshold")]
    FailureThresholdExceeded { failed: usize, total: usize },
}
