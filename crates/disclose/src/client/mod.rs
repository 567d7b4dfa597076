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

//! Downstream query client.
//!
//! Issues one "does this subject have data" query per service and
//! normalizes the fleet's inconsistent HTTP conventions into a closed
//! outcome type. The status mapping is a pure function so it can be tested
//! without network access.

pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::models::SubjectLocator;
use crate::registry::ServiceEntry;

pub use http::{HttpQueryClient, StaticTokenSource, TokenSource};

/// Outcome of one downstream query. Failures are data, not errors: a
/// failing service never aborts the request it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The service holds data for the subject; payload is the service's
    /// domain body, used verbatim as template input.
    DataHeld(Value),
    /// The service holds no data for the subject in the window.
    NoData,
    /// Retryable: network error, timeout, or 5xx.
    TransientFailure(String),
    /// Not retryable: unexpected status or malformed response.
    PermanentFailure(String),
    /// Not retryable, alert-worthy: 401/403 indicates credential or config
    /// drift rather than load.
    AuthFailure(String),
}

impl QueryOutcome {
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryOutcome::TransientFailure(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            QueryOutcome::TransientFailure(_)
                | QueryOutcome::PermanentFailure(_)
                | QueryOutcome::AuthFailure(_)
        )
    }

    pub fn data_held(&self) -> bool {
        matches!(self, QueryOutcome::DataHeld(_))
    }
}

/// Maps a downstream HTTP status and (possibly absent) JSON body to an
/// outcome.
///
/// 200 with a body is data held; 204 is no data; 209 is a legacy
/// "no content" convention some services emit — non-standard and
/// undocumented, preserved exactly as observed pending confirmation with
/// the service owners. 401/403 are auth failures surfaced for alerting;
/// other 4xx and a bodyless 200 are permanent; 5xx is transient.
pub fn classify_response(status: u16, body: Option<Value>) -> QueryOutcome {
    match status {
        200 => match body {
            Some(payload) => QueryOutcome::DataHeld(payload),
            None => QueryOutcome::PermanentFailure(
                "200 response with missing or malformed body".to_string(),
            ),
        },
        204 | 209 => QueryOutcome::NoData,
        401 | 403 => QueryOutcome::AuthFailure(format!("authentication rejected ({})", status)),
        500..=599 => QueryOutcome::TransientFailure(format!("server error ({})", status)),
        other => QueryOutcome::PermanentFailure(format!("unexpected status ({})", other)),
    }
}

/// Seam between the aggregation engine and the HTTP transport. Tests supply
/// scripted implementations; production uses [`HttpQueryClient`].
#[async_trait]
pub trait SubjectQuery: Send + Sync {
    /// Queries one service for subject data in the inclusive date window.
    ///
    /// Implementations must bound each call with a timeout and surface
    /// transport errors as `TransientFailure`, never as a panic or `Err`.
    async fn query(
        &self,
        service: &ServiceEntry,
        locator: &SubjectLocator,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> QueryOutcome;
}
