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

//! Intake and read operations for access requests.

use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use super::models::{NewRequestRow, RequestRow};
use super::RequestDal;
use crate::database::schema::{requests, service_summaries};
use crate::database::types::{date_to_text, timestamp_to_text, uuid_to_blob};
use crate::error::StoreError;
use crate::models::{AccessRequest, NewAccessRequest, RequestCounts, RequestStatus};

impl<'a> RequestDal<'a> {
    /// Registers a new access request.
    ///
    /// The duplicate check and insert run in one transaction. Duplicates are
    /// keyed on (subject locator, date window, version): the same subject
    /// and window under a new version is accepted.
    pub async fn create(&self, new: NewAccessRequest) -> Result<AccessRequest, StoreError> {
        new.validate()?;

        let conn = self.dal.database.get_connection().await?;

        let row = conn
            .interact(move |conn| {
                conn.transaction::<RequestRow, StoreError, _>(|conn| {
                    let locator = new.locator();
                    let mut duplicates = requests::table
                        .into_boxed()
                        .filter(requests::version_tag.eq(&new.version))
                        .filter(requests::date_from.eq(date_to_text(new.date_from)))
                        .filter(requests::date_to.eq(date_to_text(new.date_to)));
                    duplicates = match &locator.nomis_id {
                        Some(id) => duplicates.filter(requests::nomis_id.eq(id.clone())),
                        None => duplicates.filter(requests::nomis_id.is_null()),
                    };
                    duplicates = match &locator.ndelius_id {
                        Some(id) => duplicates.filter(requests::ndelius_id.eq(id.clone())),
                        None => duplicates.filter(requests::ndelius_id.is_null()),
                    };

                    let existing: i64 = duplicates.count().get_result(conn)?;
                    if existing > 0 {
                        return Err(StoreError::DuplicateRequest {
                            version: new.version.clone(),
                        });
                    }

                    let now = timestamp_to_text(Utc::now());
                    let row = NewRequestRow {
                        id: uuid_to_blob(Uuid::new_v4()),
                        case_reference: new.case_reference.clone(),
                        subject_name: new.subject_name.clone(),
                        nomis_id: locator.nomis_id.clone(),
                        ndelius_id: locator.ndelius_id.clone(),
                        date_from: date_to_text(new.date_from),
                        date_to: date_to_text(new.date_to),
                        version_tag: new.version.clone(),
                        status: RequestStatus::Pending.as_str().to_string(),
                        requested_at: now.clone(),
                        claim_attempts: 0,
                        created_at: now.clone(),
                        updated_at: now,
                    };

                    let inserted = diesel::insert_into(requests::table)
                        .values(&row)
                        .returning(RequestRow::as_returning())
                        .get_result(conn)?;

                    Ok(inserted)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        let request = AccessRequest::try_from(row)?;
        info!(
            request_id = %request.id,
            case_reference = %request.case_reference,
            "Registered access request"
        );
        Ok(request)
    }

    /// Fetches one request by id.
    pub async fn get(&self, id: Uuid) -> Result<AccessRequest, StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let blob = uuid_to_blob(id);

        let row: Option<RequestRow> = conn
            .interact(move |conn| {
                requests::table
                    .find(blob)
                    .select(RequestRow::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.ok_or(StoreError::NotFound { id })
            .and_then(AccessRequest::try_from)
    }

    /// Lists all requests, oldest first.
    pub async fn list(&self) -> Result<Vec<AccessRequest>, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        let rows: Vec<RequestRow> = conn
            .interact(|conn| {
                requests::table
                    .order(requests::requested_at.asc())
                    .select(RequestRow::as_select())
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(AccessRequest::try_from).collect()
    }

    /// Backlog progress counts.
    ///
    /// `completed_with_data` is derived from per-service summaries, keeping
    /// the overall "data held" verdict single-sourced.
    pub async fn counts(&self) -> Result<RequestCounts, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        let counts = conn
            .interact(|conn| {
                let total: i64 = requests::table.count().get_result(conn)?;
                let pending: i64 = requests::table
                    .filter(requests::status.eq(RequestStatus::Pending.as_str()))
                    .count()
                    .get_result(conn)?;
                let completed: i64 = requests::table
                    .filter(requests::status.eq(RequestStatus::Completed.as_str()))
                    .count()
                    .get_result(conn)?;
                let completed_with_data: i64 = requests::table
                    .filter(requests::status.eq(RequestStatus::Completed.as_str()))
                    .filter(diesel::dsl::exists(
                        service_summaries::table
                            .filter(service_summaries::request_id.eq(requests::id))
                            .filter(service_summaries::data_held.eq(true)),
                    ))
                    .count()
                    .get_result(conn)?;

                Ok::<RequestCounts, diesel::result::Error>(RequestCounts {
                    total,
                    pending,
                    completed,
                    completed_with_data,
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(counts)
    }
}
