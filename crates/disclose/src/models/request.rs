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

//! Access Request Model
//!
//! The unit of work for the pipeline: one subject, one date window, one
//! version tag. Status moves strictly forward (Pending → Claimed →
//! Completed/Failed); the only way back to Pending is an explicit operator
//! reclaim of a Failed request, and the only way back to eligibility from
//! Claimed is the staleness threshold.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Lifecycle state of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Claimed,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Claimed => "Claimed",
            RequestStatus::Completed => "Completed",
            RequestStatus::Failed => "Failed",
        }
    }

    pub fn parse(text: &str) -> Result<Self, StoreError> {
        match text {
            "Pending" => Ok(RequestStatus::Pending),
            "Claimed" => Ok(RequestStatus::Claimed),
            "Completed" => Ok(RequestStatus::Completed),
            "Failed" => Ok(RequestStatus::Failed),
            other => Err(StoreError::Corrupt(format!(
                "unknown request status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the subject is identified in downstream systems.
///
/// At least one identifier must be present; intake validation enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectLocator {
    /// Internal-system identifier (PRN).
    pub nomis_id: Option<String>,
    /// Case-management identifier (CRN).
    pub ndelius_id: Option<String>,
}

impl SubjectLocator {
    pub fn is_empty(&self) -> bool {
        self.nomis_id.is_none() && self.ndelius_id.is_none()
    }

    /// Identifier printed on report pages; prefers the internal-system id.
    pub fn display_id(&self) -> &str {
        self.nomis_id
            .as_deref()
            .or(self.ndelius_id.as_deref())
            .unwrap_or("UNKNOWN")
    }
}

/// A persisted access request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: Uuid,
    /// Human-facing case reference, printed on every report page.
    pub case_reference: String,
    pub subject_name: String,
    pub locator: SubjectLocator,
    /// Inclusive date window, `date_from <= date_to`.
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    /// Run/campaign tag; uniqueness is scoped to
    /// (locator, date window, version), not globally.
    pub version: String,
    pub status: RequestStatus,
    /// When the request was received; claim selection is FIFO on this.
    pub requested_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Incremented by every won claim. Doubles as the claim epoch for
    /// complete/fail preconditions, and is the sole repeated-failure signal
    /// for alerting. Never decreases.
    pub claim_attempts: i32,
    pub failure_reason: Option<String>,
    /// Set only on Completed.
    pub artifact_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessRequest {
    /// The claim epoch this holder must present to complete or fail the
    /// request.
    pub fn claim_epoch(&self) -> i32 {
        self.claim_attempts
    }
}

/// Intake payload for a new access request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccessRequest {
    pub case_reference: String,
    pub subject_name: String,
    pub nomis_id: Option<String>,
    pub ndelius_id: Option<String>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub version: String,
}

impl NewAccessRequest {
    /// Intake validation: a locator must be present, the window must be
    /// ordered, and the human-facing fields must be non-blank.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.locator().is_empty() {
            return Err(StoreError::InvalidRequest(
                "at least one subject identifier (nomis_id or ndelius_id) is required".into(),
            ));
        }
        if self.date_from > self.date_to {
            return Err(StoreError::InvalidRequest(format!(
                "date_from {} is after date_to {}",
                self.date_from, self.date_to
            )));
        }
        if self.case_reference.trim().is_empty() {
            return Err(StoreError::InvalidRequest("case_reference is required".into()));
        }
        if self.version.trim().is_empty() {
            return Err(StoreError::InvalidRequest("version is required".into()));
        }
        Ok(())
    }

    /// The normalized subject locator; blank identifiers count as absent.
    pub fn locator(&self) -> SubjectLocator {
        SubjectLocator {
            nomis_id: self.nomis_id.clone().filter(|s| !s.trim().is_empty()),
            ndelius_id: self.ndelius_id.clone().filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Backlog progress counts for the intake surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    /// Completed requests where at least one service held data. Derived from
    /// per-service summaries; never stored as its own column.
    pub completed_with_data: i64,
}
