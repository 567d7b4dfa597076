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

//! Terminal state transitions for access requests.
//!
//! `complete` and `fail` require the caller's claim epoch: the update is
//! conditional on status = Claimed AND claim_attempts = epoch, so a worker
//! whose claim went stale and was re-claimed can no longer finish the
//! request. Zero rows affected is an `InvalidTransition`, surfaced, never
//! swallowed.

use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use super::RequestDal;
use crate::database::schema::requests;
use crate::database::types::{timestamp_to_text, uuid_to_blob};
use crate::error::StoreError;
use crate::models::RequestStatus;

impl<'a> RequestDal<'a> {
    /// Transitions Claimed → Completed and records the artifact reference.
    pub async fn complete(
        &self,
        id: Uuid,
        claim_epoch: i32,
        artifact_ref: &str,
    ) -> Result<(), StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let blob = uuid_to_blob(id);
        let artifact = artifact_ref.to_string();
        let now_text = timestamp_to_text(Utc::now());

        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    requests::table
                        .filter(requests::id.eq(blob))
                        .filter(requests::status.eq(RequestStatus::Claimed.as_str()))
                        .filter(requests::claim_attempts.eq(claim_epoch)),
                )
                .set((
                    requests::status.eq(RequestStatus::Completed.as_str()),
                    requests::artifact_ref.eq(Some(artifact)),
                    requests::updated_at.eq(now_text),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(StoreError::InvalidTransition {
                id,
                expected: format!("Claimed at epoch {}", claim_epoch),
            });
        }

        info!(request_id = %id, artifact_ref = %artifact_ref, "Completed access request");
        Ok(())
    }

    /// Transitions Claimed → Failed and records the reason.
    pub async fn fail(&self, id: Uuid, claim_epoch: i32, reason: &str) -> Result<(), StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let blob = uuid_to_blob(id);
        let reason_text = reason.to_string();
        let now_text = timestamp_to_text(Utc::now());

        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    requests::table
                        .filter(requests::id.eq(blob))
                        .filter(requests::status.eq(RequestStatus::Claimed.as_str()))
                        .filter(requests::claim_attempts.eq(claim_epoch)),
                )
                .set((
                    requests::status.eq(RequestStatus::Failed.as_str()),
                    requests::failure_reason.eq(Some(reason_text)),
                    requests::updated_at.eq(now_text),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(StoreError::InvalidTransition {
                id,
                expected: format!("Claimed at epoch {}", claim_epoch),
            });
        }

        info!(request_id = %id, reason, "Failed access request");
        Ok(())
    }

    /// Explicit operator action returning a Failed request to Pending.
    ///
    /// This is the only path back to Pending besides staleness reclaim;
    /// Failed requests are never retried automatically.
    pub async fn reclaim_failed(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let blob = uuid_to_blob(id);
        let now_text = timestamp_to_text(Utc::now());

        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    requests::table
                        .filter(requests::id.eq(blob))
                        .filter(requests::status.eq(RequestStatus::Failed.as_str())),
                )
                .set((
                    requests::status.eq(RequestStatus::Pending.as_str()),
                    requests::claimed_at.eq(None::<String>),
                    requests::failure_reason.eq(None::<String>),
                    requests::updated_at.eq(now_text),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(StoreError::InvalidTransition {
                id,
                expected: "Failed".to_string(),
            });
        }

        info!(request_id = %id, "Reclaimed failed access request for reprocessing");
        Ok(())
    }
}
