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

//! SQLite row models.
//!
//! UUIDs as BLOB (`Vec<u8>`), timestamps as RFC3339 TEXT, dates as
//! `%Y-%m-%d` TEXT. Converted to domain types at the DAL boundary.

use diesel::prelude::*;

use crate::database::schema::{requests, service_summaries};
use crate::database::types::{date_from_text, timestamp_from_text, uuid_from_blob};
use crate::error::StoreError;
use crate::models::{
    AccessRequest, ProcessingStatus, RequestStatus, ServiceSummary, SubjectLocator,
};

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RequestRow {
    pub id: Vec<u8>,
    pub case_reference: String,
    pub subject_name: String,
    pub nomis_id: Option<String>,
    pub ndelius_id: Option<String>,
    pub date_from: String,
    pub date_to: String,
    pub version_tag: String,
    pub status: String,
    pub requested_at: String,
    pub claimed_at: Option<String>,
    pub claim_attempts: i32,
    pub failure_reason: Option<String>,
    pub artifact_ref: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = requests)]
pub struct NewRequestRow {
    pub id: Vec<u8>,
    pub case_reference: String,
    pub subject_name: String,
    pub nomis_id: Option<String>,
    pub ndelius_id: Option<String>,
    pub date_from: String,
    pub date_to: String,
    pub version_tag: String,
    pub status: String,
    pub requested_at: String,
    pub claim_attempts: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<RequestRow> for AccessRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(AccessRequest {
            id: uuid_from_blob(&row.id)?,
            case_reference: row.case_reference,
            subject_name: row.subject_name,
            locator: SubjectLocator {
                nomis_id: row.nomis_id,
                ndelius_id: row.ndelius_id,
            },
            date_from: date_from_text(&row.date_from)?,
            date_to: date_from_text(&row.date_to)?,
            version: row.version_tag,
            status: RequestStatus::parse(&row.status)?,
            requested_at: timestamp_from_text(&row.requested_at)?,
            claimed_at: row
                .claimed_at
                .as_deref()
                .map(timestamp_from_text)
                .transpose()?,
            claim_attempts: row.claim_attempts,
            failure_reason: row.failure_reason,
            artifact_ref: row.artifact_ref,
            created_at: timestamp_from_text(&row.created_at)?,
            updated_at: timestamp_from_text(&row.updated_at)?,
        })
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = service_summaries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SummaryRow {
    pub id: Vec<u8>,
    pub request_id: Vec<u8>,
    pub service_name: String,
    pub position: i32,
    pub processing_status: String,
    pub data_held: bool,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = service_summaries)]
pub struct NewSummaryRow {
    pub id: Vec<u8>,
    pub request_id: Vec<u8>,
    pub service_name: String,
    pub position: i32,
    pub processing_status: String,
    pub data_held: bool,
    pub created_at: String,
}

impl TryFrom<SummaryRow> for ServiceSummary {
    type Error = StoreError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(ServiceSummary {
            service_name: row.service_name,
            processing_status: ProcessingStatus::parse(&row.processing_status)?,
            data_held: row.data_held,
        })
    }
}
