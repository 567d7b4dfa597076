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

//! Data access layer for the request store.
//!
//! The claim state machine lives here: `claim_next` wins eligible requests
//! with a conditional update that only one caller can satisfy, and
//! `complete`/`fail` are guarded on the caller's claim epoch. These
//! conditional updates are the sole synchronization primitive across
//! workers; there are no in-process locks.

pub mod claiming;
pub mod models;
pub mod request;
pub mod service_summary;
pub mod state;

use crate::database::Database;

/// Data access layer facade.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct DAL {
    pub(crate) database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Access request operations: intake, claiming, lifecycle transitions.
    pub fn requests(&self) -> RequestDal<'_> {
        RequestDal { dal: self }
    }

    /// Per-service summary operations.
    pub fn service_summaries(&self) -> ServiceSummaryDal<'_> {
        ServiceSummaryDal { dal: self }
    }
}

/// DAL for access requests. Operation impls are split across
/// [`request`], [`claiming`] and [`state`].
#[derive(Clone)]
pub struct RequestDal<'a> {
    dal: &'a DAL,
}

/// DAL for per-service summaries.
#[derive(Clone)]
pub struct ServiceSummaryDal<'a> {
    dal: &'a DAL,
}
