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

//! Claim acquisition.
//!
//! `claim_next` selects the oldest eligible request and wins it with a
//! conditional update guarded on the (status, claim_attempts) pair it
//! observed. Only one concurrent caller can satisfy the guard; losers
//! re-select. Eligible means Pending, or Claimed past the staleness
//! threshold (worker crash recovery).

use chrono::Utc;
use diesel::prelude::*;
use std::time::Duration;
use tracing::{debug, info};

use super::models::RequestRow;
use super::RequestDal;
use crate::database::schema::requests;
use crate::database::types::{timestamp_to_text, uuid_from_blob};
use crate::error::StoreError;
use crate::models::{AccessRequest, RequestStatus};

/// How many lost races one `claim_next` call absorbs before reporting no
/// work. Callers poll, so giving up early is safe.
const CLAIM_SELECT_RETRIES: usize = 5;

impl<'a> RequestDal<'a> {
    /// Atomically claims the oldest eligible request, if any.
    ///
    /// On success the request is Claimed, `claimed_at` is now, and
    /// `claim_attempts` has been incremented; the returned record carries
    /// the caller's claim epoch for the later complete/fail call.
    ///
    /// Returns `Ok(None)` when no eligible request exists or every selection
    /// was lost to a concurrent claimer.
    pub async fn claim_next(
        &self,
        stale_after: Duration,
    ) -> Result<Option<AccessRequest>, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        for _ in 0..CLAIM_SELECT_RETRIES {
            let now = Utc::now();
            let stale_cutoff = timestamp_to_text(
                now - chrono::Duration::from_std(stale_after)
                    .map_err(|e| StoreError::InvalidRequest(e.to_string()))?,
            );

            // Oldest eligible request and the claim state we must beat.
            let candidate: Option<(Vec<u8>, String, i32)> = conn
                .interact(move |conn| {
                    requests::table
                        .filter(
                            requests::status
                                .eq(RequestStatus::Pending.as_str())
                                .or(requests::status
                                    .eq(RequestStatus::Claimed.as_str())
                                    .and(requests::claimed_at.le(stale_cutoff))),
                        )
                        .order(requests::requested_at.asc())
                        .select((requests::id, requests::status, requests::claim_attempts))
                        .first(conn)
                        .optional()
                })
                .await
                .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

            let Some((id_blob, seen_status, seen_attempts)) = candidate else {
                return Ok(None);
            };
            let id = uuid_from_blob(&id_blob)?;

            let now_text = timestamp_to_text(now);
            let guard_blob = id_blob.clone();
            let updated = conn
                .interact(move |conn| {
                    diesel::update(
                        requests::table
                            .filter(requests::id.eq(guard_blob))
                            .filter(requests::status.eq(seen_status))
                            .filter(requests::claim_attempts.eq(seen_attempts)),
                    )
                    .set((
                        requests::status.eq(RequestStatus::Claimed.as_str()),
                        requests::claimed_at.eq(Some(now_text.clone())),
                        requests::claim_attempts.eq(seen_attempts + 1),
                        requests::updated_at.eq(now_text),
                    ))
                    .execute(conn)
                })
                .await
                .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

            if updated == 1 {
                // Readback is guarded on the epoch just written: with a very
                // short staleness threshold another worker may reclaim the
                // row before we read it back, and this claim must then be
                // treated as lost rather than returned at a stale epoch.
                let row: Option<RequestRow> = conn
                    .interact(move |conn| {
                        requests::table
                            .find(id_blob)
                            .filter(requests::status.eq(RequestStatus::Claimed.as_str()))
                            .filter(requests::claim_attempts.eq(seen_attempts + 1))
                            .select(RequestRow::as_select())
                            .first(conn)
                            .optional()
                    })
                    .await
                    .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

                if let Some(row) = row {
                    let request = AccessRequest::try_from(row)?;
                    info!(
                        request_id = %request.id,
                        case_reference = %request.case_reference,
                        claim_attempts = request.claim_attempts,
                        "Claimed access request"
                    );
                    return Ok(Some(request));
                }

                debug!(request_id = %id, "Claim overtaken before readback, re-selecting");
                continue;
            }

            debug!(request_id = %id, "Lost claim race, re-selecting");
        }

        Ok(None)
    }

    /// Counts requests currently eligible for claiming.
    pub async fn eligible_count(&self, stale_after: Duration) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let stale_cutoff = timestamp_to_text(
            Utc::now()
                - chrono::Duration::from_std(stale_after)
                    .map_err(|e| StoreError::InvalidRequest(e.to_string()))?,
        );

        let count: i64 = conn
            .interact(move |conn| {
                requests::table
                    .filter(
                        requests::status
                            .eq(RequestStatus::Pending.as_str())
                            .or(requests::status
                                .eq(RequestStatus::Claimed.as_str())
                                .and(requests::claimed_at.le(stale_cutoff))),
                    )
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}
