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

//! Concurrency tests for request claiming.
//!
//! These verify that the compare-and-swap claim protocol prevents two
//! workers from claiming the same request, with or without staleness in
//! play.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use disclose::dal::DAL;

use crate::fixtures::{new_request, test_database};

const NOT_STALE: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn single_request_has_exactly_one_winner() {
    let database = test_database("claim_single_winner").await;
    let dal = DAL::new(database.clone());

    let request = dal
        .requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .expect("Failed to create request");

    const NUM_WORKERS: usize = 8;
    let barrier = Arc::new(Barrier::new(NUM_WORKERS));
    let mut handles = Vec::new();

    for _ in 0..NUM_WORKERS {
        let db = database.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let dal = DAL::new(db);
            barrier.wait().await;
            dal.requests()
                .claim_next(NOT_STALE)
                .await
                .expect("Claim call failed")
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(claimed) = handle.await.expect("Worker panicked") {
            winners.push(claimed);
        }
    }

    assert_eq!(winners.len(), 1, "Exactly one worker must win the claim");
    assert_eq!(winners[0].id, request.id);
    assert_eq!(winners[0].claim_attempts, 1);
}

#[tokio::test]
async fn concurrent_workers_claim_distinct_requests() {
    let database = test_database("claim_distinct").await;
    let dal = DAL::new(database.clone());

    const NUM_REQUESTS: usize = 10;
    for i in 0..NUM_REQUESTS {
        dal.requests()
            .create(new_request(
                &format!("SAR-2024-{:04}", i),
                &format!("A{:04}AA", i),
                "v1",
            ))
            .await
            .expect("Failed to create request");
    }

    const NUM_WORKERS: usize = 4;
    let barrier = Arc::new(Barrier::new(NUM_WORKERS));
    let mut handles = Vec::new();

    for _ in 0..NUM_WORKERS {
        let db = database.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let dal = DAL::new(db);
            barrier.wait().await;

            let mut claimed = Vec::new();
            loop {
                match dal.requests().claim_next(NOT_STALE).await {
                    Ok(Some(request)) => claimed.push(request.id),
                    Ok(None) => break,
                    Err(e) => panic!("Claim call failed: {:?}", e),
                }
            }
            claimed
        }));
    }

    let mut all_claimed = Vec::new();
    for handle in handles {
        all_claimed.extend(handle.await.expect("Worker panicked"));
    }

    let unique: HashSet<_> = all_claimed.iter().collect();
    assert_eq!(
        all_claimed.len(),
        unique.len(),
        "A request was claimed by more than one worker"
    );
    assert_eq!(unique.len(), NUM_REQUESTS, "Every request must be claimed once");
}

#[tokio::test]
async fn empty_store_yields_no_claim() {
    let database = test_database("claim_empty").await;
    let dal = DAL::new(database);

    let claimed = dal
        .requests()
        .claim_next(NOT_STALE)
        .await
        .expect("Claim call failed");
    assert!(claimed.is_none());
}

#[tokio::test]
async fn claims_follow_request_age_order() {
    let database = test_database("claim_fifo").await;
    let dal = DAL::new(database);

    let first = dal
        .requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();
    let second = dal
        .requests()
        .create(new_request("SAR-2024-0002", "A0002AA", "v1"))
        .await
        .unwrap();

    let claimed_first = dal.requests().claim_next(NOT_STALE).await.unwrap().unwrap();
    let claimed_second = dal.requests().claim_next(NOT_STALE).await.unwrap().unwrap();

    assert_eq!(claimed_first.id, first.id);
    assert_eq!(claimed_second.id, second.id);
}

#[tokio::test]
async fn stale_claim_is_reclaimable_and_fences_the_old_holder() {
    let database = test_database("claim_stale").await;
    let dal = DAL::new(database);

    let request = dal
        .requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();

    let first_claim = dal.requests().claim_next(NOT_STALE).await.unwrap().unwrap();
    assert_eq!(first_claim.claim_attempts, 1);

    // A fresh claim is invisible to other workers.
    assert!(dal.requests().claim_next(NOT_STALE).await.unwrap().is_none());

    // With a zero staleness threshold the same claim is immediately
    // reclaimable, at a higher epoch.
    let second_claim = dal
        .requests()
        .claim_next(Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second_claim.id, request.id);
    assert_eq!(second_claim.claim_attempts, 2);

    // The original holder's epoch no longer satisfies the completion guard.
    let result = dal
        .requests()
        .complete(request.id, first_claim.claim_epoch(), "ref")
        .await;
    assert!(matches!(
        result,
        Err(disclose::error::StoreError::InvalidTransition { .. })
    ));

    // The new holder finishes normally.
    dal.requests()
        .complete(request.id, second_claim.claim_epoch(), "ref")
        .await
        .expect("Current holder must be able to complete");
}

#[tokio::test]
async fn concurrent_reclaims_never_share_an_epoch() {
    let database = test_database("claim_epoch_unique").await;
    let dal = DAL::new(database.clone());

    dal.requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();

    // A zero staleness threshold makes every won claim instantly
    // reclaimable, so the conditional update and the readback race against
    // concurrent reclaims of the same row. Every returned claim must still
    // carry a distinct epoch.
    const NUM_WORKERS: usize = 6;
    let barrier = Arc::new(Barrier::new(NUM_WORKERS));
    let mut handles = Vec::new();

    for _ in 0..NUM_WORKERS {
        let db = database.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let dal = DAL::new(db);
            barrier.wait().await;
            dal.requests()
                .claim_next(Duration::ZERO)
                .await
                .expect("Claim call failed")
        }));
    }

    let mut epochs = Vec::new();
    for handle in handles {
        if let Some(claimed) = handle.await.expect("Worker panicked") {
            epochs.push(claimed.claim_attempts);
        }
    }

    assert!(!epochs.is_empty());
    let unique: HashSet<_> = epochs.iter().collect();
    assert_eq!(
        epochs.len(),
        unique.len(),
        "Two claim holders observed the same epoch: {:?}",
        epochs
    );
}

#[tokio::test]
async fn eligible_count_tracks_pending_and_stale() {
    let database = test_database("claim_eligible_count").await;
    let dal = DAL::new(database);

    dal.requests()
        .create(new_request("SAR-2024-0001", "A0001AA", "v1"))
        .await
        .unwrap();
    dal.requests()
        .create(new_request("SAR-2024-0002", "A0002AA", "v1"))
        .await
        .unwrap();

    assert_eq!(dal.requests().eligible_count(NOT_STALE).await.unwrap(), 2);

    dal.requests().claim_next(NOT_STALE).await.unwrap().unwrap();
    assert_eq!(dal.requests().eligible_count(NOT_STALE).await.unwrap(), 1);
    // The claimed one reappears under a zero staleness threshold.
    assert_eq!(
        dal.requests().eligible_count(Duration::ZERO).await.unwrap(),
        2
    );
}
