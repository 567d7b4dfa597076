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

//! Lifecycle tests: intake, terminal transitions, operator reclaim, and
//! backlog counts.

use std::time::Duration;

use disclose::dal::DAL;
use disclose::error::StoreError;
use disclose::models::{NewServiceSummary, ProcessingStatus, RequestStatus};

use crate::fixtures::{new_request, test_database};

const NOT_STALE: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn completion_is_terminal_and_records_the_artifact() {
    let database = test_database("lifecycle_complete").await;
    let dal = DAL::new(database);

    let request = dal
        .requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();
    let claimed = dal.requests().claim_next(NOT_STALE).await.unwrap().unwrap();

    dal.requests()
        .complete(request.id, claimed.claim_epoch(), "SAR-2024-0001/report.txt")
        .await
        .unwrap();

    let stored = dal.requests().get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);
    assert_eq!(
        stored.artifact_ref.as_deref(),
        Some("SAR-2024-0001/report.txt")
    );

    // Completing twice is an invalid transition, not a silent no-op.
    assert!(matches!(
        dal.requests()
            .complete(request.id, claimed.claim_epoch(), "other")
            .await,
        Err(StoreError::InvalidTransition { .. })
    ));

    // Completed requests never become claimable again, even as "stale".
    assert!(dal
        .requests()
        .claim_next(Duration::ZERO)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_requests_wait_for_operator_reclaim() {
    let database = test_database("lifecycle_fail_reclaim").await;
    let dal = DAL::new(database);

    let request = dal
        .requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();
    let claimed = dal.requests().claim_next(NOT_STALE).await.unwrap().unwrap();

    dal.requests()
        .fail(request.id, claimed.claim_epoch(), "too many services failed")
        .await
        .unwrap();

    let stored = dal.requests().get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Failed);
    assert_eq!(
        stored.failure_reason.as_deref(),
        Some("too many services failed")
    );

    // Failed requests are not retried automatically.
    assert!(dal
        .requests()
        .claim_next(Duration::ZERO)
        .await
        .unwrap()
        .is_none());

    dal.requests().reclaim_failed(request.id).await.unwrap();
    let stored = dal.requests().get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(stored.failure_reason.is_none());
    assert!(stored.claimed_at.is_none());

    // The reclaimed request is claimable again, at the next epoch.
    let reclaimed = dal.requests().claim_next(NOT_STALE).await.unwrap().unwrap();
    assert_eq!(reclaimed.id, request.id);
    assert_eq!(reclaimed.claim_attempts, 2);
}

#[tokio::test]
async fn reclaim_requires_failed_status() {
    let database = test_database("lifecycle_reclaim_guard").await;
    let dal = DAL::new(database);

    let request = dal
        .requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();

    assert!(matches!(
        dal.requests().reclaim_failed(request.id).await,
        Err(StoreError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn duplicate_intake_is_rejected_per_version() {
    let database = test_database("lifecycle_duplicates").await;
    let dal = DAL::new(database);

    dal.requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();

    // Same subject, window, and version: rejected.
    assert!(matches!(
        dal.requests()
            .create(new_request("SAR-2024-0002", "A0001AA", "v1"))
            .await,
        Err(StoreError::DuplicateRequest { .. })
    ));

    // Same subject and window under a new version: accepted.
    dal.requests()
        .create(new_request("SAR-2024-0003", "A0001AA", "v2"))
        .await
        .expect("New version must be accepted");
}

#[tokio::test]
async fn intake_validation_is_enforced() {
    let database = test_database("lifecycle_validation").await;
    let dal = DAL::new(database);

    let mut invalid = new_request("SAR-2024-0001", "A0001AA", "v1");
    invalid.nomis_id = None;

    assert!(matches!(
        dal.requests().create(invalid).await,
        Err(StoreError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn blank_identifiers_are_stored_as_absent() {
    let database = test_database("lifecycle_blank_locator").await;
    let dal = DAL::new(database);

    let mut intake = new_request("SAR-2024-0001", "unused", "v1");
    intake.nomis_id = Some("  ".into());
    intake.ndelius_id = Some("X123456".into());

    let request = dal.requests().create(intake).await.unwrap();
    assert!(request.locator.nomis_id.is_none());
    assert_eq!(request.locator.ndelius_id.as_deref(), Some("X123456"));
    assert_eq!(request.locator.display_id(), "X123456");
}

#[tokio::test]
async fn summaries_persist_in_position_order() {
    let database = test_database("lifecycle_summaries").await;
    let dal = DAL::new(database);

    let request = dal
        .requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();

    let summaries = vec![
        NewServiceSummary {
            service_name: "custody".into(),
            processing_status: ProcessingStatus::Completed,
            data_held: true,
        },
        NewServiceSummary {
            service_name: "probation".into(),
            processing_status: ProcessingStatus::Completed,
            data_held: false,
        },
        NewServiceSummary {
            service_name: "health".into(),
            processing_status: ProcessingStatus::Failed,
            data_held: false,
        },
    ];
    dal.service_summaries()
        .replace_for_request(request.id, summaries)
        .await
        .unwrap();

    let stored = dal
        .service_summaries()
        .list_for_request(request.id)
        .await
        .unwrap();
    let names: Vec<_> = stored.iter().map(|s| s.service_name.as_str()).collect();
    assert_eq!(names, ["custody", "probation", "health"]);
    assert!(stored[0].data_held);
    assert_eq!(stored[2].processing_status, ProcessingStatus::Failed);

    // Replacing is idempotent on re-runs of the same request.
    dal.service_summaries()
        .replace_for_request(
            request.id,
            vec![NewServiceSummary {
                service_name: "custody".into(),
                processing_status: ProcessingStatus::Completed,
                data_held: false,
            }],
        )
        .await
        .unwrap();
    let stored = dal
        .service_summaries()
        .list_for_request(request.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn counts_track_the_backlog() {
    let database = test_database("lifecycle_counts").await;
    let dal = DAL::new(database);

    let done = dal
        .requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();
    dal.requests()
        .create(new_request("SAR-2024-0002", "A0002AA", "v1"))
        .await
        .unwrap();

    let claimed = dal.requests().claim_next(NOT_STALE).await.unwrap().unwrap();
    assert_eq!(claimed.id, done.id);
    dal.service_summaries()
        .replace_for_request(
            done.id,
            vec![NewServiceSummary {
                service_name: "custody".into(),
                processing_status: ProcessingStatus::Completed,
                data_held: true,
            }],
        )
        .await
        .unwrap();
    dal.requests()
        .complete(done.id, claimed.claim_epoch(), "ref")
        .await
        .unwrap();

    let counts = dal.requests().counts().await.unwrap();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.completed_with_data, 1);
}
