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

//! Per-service summary persistence.
//!
//! Summaries are written once per request by the aggregation step, in
//! registry order; `position` preserves that order for readers.

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use super::models::{NewSummaryRow, SummaryRow};
use super::ServiceSummaryDal;
use crate::database::schema::service_summaries;
use crate::database::types::{timestamp_to_text, uuid_to_blob};
use crate::error::StoreError;
use crate::models::{NewServiceSummary, ServiceSummary};

impl<'a> ServiceSummaryDal<'a> {
    /// Replaces the summaries for a request in one transaction.
    ///
    /// Position is assigned from slice order, which callers supply in
    /// registry order.
    pub async fn replace_for_request(
        &self,
        request_id: Uuid,
        summaries: Vec<NewServiceSummary>,
    ) -> Result<(), StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let request_blob = uuid_to_blob(request_id);
        let now_text = timestamp_to_text(Utc::now());

        conn.interact(move |conn| {
            conn.transaction::<(), diesel::result::Error, _>(|conn| {
                diesel::delete(
                    service_summaries::table
                        .filter(service_summaries::request_id.eq(&request_blob)),
                )
                .execute(conn)?;

                let rows: Vec<NewSummaryRow> = summaries
                    .iter()
                    .enumerate()
                    .map(|(position, summary)| NewSummaryRow {
                        id: uuid_to_blob(Uuid::new_v4()),
                        request_id: request_blob.clone(),
                        service_name: summary.service_name.clone(),
                        position: position as i32,
                        processing_status: summary.processing_status.as_str().to_string(),
                        data_held: summary.data_held,
                        created_at: now_text.clone(),
                    })
                    .collect();

                diesel::insert_into(service_summaries::table)
                    .values(&rows)
                    .execute(conn)?;

                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Summaries for a request, in the order they were recorded
    /// (registry order).
    pub async fn list_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<ServiceSummary>, StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let request_blob = uuid_to_blob(request_id);

        let rows: Vec<SummaryRow> = conn
            .interact(move |conn| {
                service_summaries::table
                    .filter(service_summaries::request_id.eq(request_blob))
                    .order(service_summaries::position.asc())
                    .select(SummaryRow::as_select())
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(ServiceSummary::try_from).collect()
    }
}
