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

//! # Disclose
//!
//! A fulfilment pipeline for subject access requests.
//!
//! An access request names a subject (by NOMIS and/or nDelius identifier), a
//! date window, and a case reference. The pipeline claims pending requests
//! from a SQLite-backed store, fans out to every service in the configured
//! [`registry::ServiceRegistry`], aggregates the per-service outcomes, and
//! composes a paginated disclosure report that is written to an
//! [`artifact::ArtifactStore`].
//!
//! The claim protocol is an optimistic compare-and-swap over the request row,
//! so multiple workers can share one store without double-processing; a
//! worker that dies mid-request leaves a Claimed row that becomes eligible
//! again once it goes stale.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use disclose::{
//!     alert::LogNotifier,
//!     artifact::FilesystemArtifactStore,
//!     client::{HttpQueryClient, StaticTokenSource},
//!     dal::DAL,
//!     database::Database,
//!     registry::ServiceRegistry,
//!     report::TemplateStore,
//!     worker::{PipelineWorker, WorkerConfig},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let database = Database::new("sar.db", 5);
//! database.run_migrations().await?;
//!
//! let registry = Arc::new(ServiceRegistry::from_toml_file("services.toml".as_ref())?);
//! let client = Arc::new(HttpQueryClient::new(
//!     std::time::Duration::from_secs(30),
//!     Arc::new(StaticTokenSource::new("token")),
//! ));
//! let templates = TemplateStore::from_dir("templates".as_ref())?;
//!
//! let worker = PipelineWorker::new(
//!     DAL::new(database),
//!     registry,
//!     client,
//!     templates,
//!     Arc::new(FilesystemArtifactStore::new("artifacts")),
//!     Arc::new(LogNotifier),
//!     WorkerConfig::default(),
//! );
//! worker.run().await;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod alert;
pub mod artifact;
pub mod client;
pub mod dal;
pub mod database;
pub mod error;
pub mod models;
pub mod registry;
pub mod report;
pub mod worker;

pub use aggregator::{AggregationConfig, Aggregator};
pub use alert::{AlertEvent, AlertNotifier, LogNotifier};
pub use artifact::{ArtifactStore, FilesystemArtifactStore};
pub use client::{HttpQueryClient, QueryOutcome, SubjectQuery};
pub use dal::DAL;
pub use database::Database;
pub use error::{PipelineError, RegistryError, RenderError, StoreError};
pub use models::{AccessRequest, NewAccessRequest, RequestStatus, SubjectLocator};
pub use registry::{ServiceEntry, ServiceRegistry};
pub use report::{ComposedReport, ReportComposer, TemplateStore};
pub use worker::{PipelineWorker, WorkerConfig};

/// Initializes tracing with an env-filter subscriber.
///
/// Honors `RUST_LOG`; defaults to `info` for this crate and `warn` for
/// everything else. Safe to call once per process.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,disclose=info,disclose_worker=info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
