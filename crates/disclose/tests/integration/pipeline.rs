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

//! End-to-end pipeline tests: claim, aggregate, compose, store, complete.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use disclose::aggregator::AggregationConfig;
use disclose::alert::{AlertEvent, AlertNotifier};
use disclose::artifact::{ArtifactStore, FilesystemArtifactStore};
use disclose::client::{QueryOutcome, SubjectQuery};
use disclose::dal::DAL;
use disclose::models::{ProcessingStatus, RequestStatus, ServiceSummary, SubjectLocator};
use disclose::registry::{ServiceEntry, ServiceRegistry};
use disclose::report::TemplateStore;
use disclose::worker::{CycleOutcome, PipelineWorker, WorkerConfig};

use crate::fixtures::{new_request, test_database};

/// Query stub returning a fixed outcome per service name.
struct FixedClient {
    outcomes: HashMap<String, QueryOutcome>,
}

#[async_trait]
impl SubjectQuery for FixedClient {
    async fn query(
        &self,
        service: &ServiceEntry,
        _locator: &SubjectLocator,
        _date_from: NaiveDate,
        _date_to: NaiveDate,
    ) -> QueryOutcome {
        self.outcomes
            .get(&service.name)
            .cloned()
            .unwrap_or(QueryOutcome::NoData)
    }
}

/// Notifier that records every event for assertion.
#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<AlertEvent>>,
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, event: AlertEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn registry() -> Arc<ServiceRegistry> {
    Arc::new(
        ServiceRegistry::new(vec![
            ServiceEntry {
                name: "custody".into(),
                base_url: "http://custody.local".into(),
                display_order: 1,
            },
            ServiceEntry {
                name: "probation".into(),
                base_url: "http://probation.local".into(),
                display_order: 2,
            },
            ServiceEntry {
                name: "health".into(),
                base_url: "http://health.local".into(),
                display_order: 3,
            },
        ])
        .unwrap(),
    )
}

fn templates() -> TemplateStore {
    TemplateStore::new(HashMap::from([(
        "custody".to_string(),
        "Bookings: {{ bookings }}".to_string(),
    )]))
}

fn config() -> WorkerConfig {
    WorkerConfig::builder()
        .aggregation(AggregationConfig {
            max_in_flight: 4,
            retry_attempts: 0,
            retry_base_delay: std::time::Duration::from_millis(1),
        })
        .build()
}

struct Harness {
    dal: DAL,
    worker: PipelineWorker,
    artifacts: Arc<FilesystemArtifactStore>,
    alerts: Arc<RecordingNotifier>,
    _dir: tempfile::TempDir,
}

async fn harness(label: &str, outcomes: HashMap<String, QueryOutcome>) -> Harness {
    let database = test_database(label).await;
    let dir = tempfile::tempdir().unwrap();
    let artifacts = Arc::new(FilesystemArtifactStore::new(dir.path()));
    let alerts = Arc::new(RecordingNotifier::default());

    let worker = PipelineWorker::new(
        DAL::new(database.clone()),
        registry(),
        Arc::new(FixedClient { outcomes }),
        templates(),
        artifacts.clone(),
        alerts.clone(),
        config(),
    );

    Harness {
        dal: DAL::new(database),
        worker,
        artifacts,
        alerts,
        _dir: dir,
    }
}

#[tokio::test]
async fn fulfils_a_request_end_to_end() {
    let h = harness(
        "pipeline_happy",
        HashMap::from([
            (
                "custody".to_string(),
                QueryOutcome::DataHeld(json!({"bookings": 3})),
            ),
            ("probation".to_string(), QueryOutcome::NoData),
            ("health".to_string(), QueryOutcome::NoData),
        ]),
    )
    .await;

    let request = h
        .dal
        .requests()
        .create(new_request("SAR-2024-0042", "A1234BC", "v1"))
        .await
        .unwrap();

    let outcome = h.worker.process_next().await.unwrap();
    let Some(CycleOutcome::Completed {
        request_id,
        artifact_ref,
        page_count,
        overall_data_held,
    }) = outcome
    else {
        panic!("Expected a completed cycle, got {:?}", outcome);
    };
    assert_eq!(request_id, request.id);
    assert!(page_count >= 1);
    assert!(overall_data_held);

    let stored = h.dal.requests().get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);
    assert_eq!(stored.artifact_ref.as_deref(), Some(artifact_ref.as_str()));

    // The stored artifact is the stamped report.
    let bytes = h.artifacts.get(&artifact_ref).await.unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("CASE REFERENCE: SAR-2024-0042"));
    assert!(text.contains("Bookings: 3"));
    assert!(text.contains("SERVICE: probation"));

    // One summary per service, in registry order.
    let summaries = h
        .dal
        .service_summaries()
        .list_for_request(request.id)
        .await
        .unwrap();
    let names: Vec<_> = summaries.iter().map(|s| s.service_name.as_str()).collect();
    assert_eq!(names, ["custody", "probation", "health"]);
    assert!(summaries[0].data_held);
    assert!(!summaries[1].data_held);
}

#[tokio::test]
async fn no_pending_requests_is_an_idle_cycle() {
    let h = harness("pipeline_idle", HashMap::new()).await;
    assert!(h.worker.process_next().await.unwrap().is_none());
}

#[tokio::test]
async fn too_many_service_failures_fail_the_request() {
    let h = harness(
        "pipeline_threshold",
        HashMap::from([
            ("custody".to_string(), QueryOutcome::NoData),
            (
                "probation".to_string(),
                QueryOutcome::PermanentFailure("404".into()),
            ),
            (
                "health".to_string(),
                QueryOutcome::TransientFailure("503".into()),
            ),
        ]),
    )
    .await;

    let request = h
        .dal
        .requests()
        .create(new_request("SAR-2024-0042", "A1234BC", "v1"))
        .await
        .unwrap();

    // 2 of 3 services failed, above the default 0.5 threshold.
    let outcome = h.worker.process_next().await.unwrap();
    assert!(matches!(outcome, Some(CycleOutcome::Failed { .. })));

    let stored = h.dal.requests().get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Failed);
    assert!(stored
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("2 of 3"));
    assert!(stored.artifact_ref.is_none());

    // Summaries still record what happened to each service.
    let summaries = h
        .dal
        .service_summaries()
        .list_for_request(request.id)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[1].processing_status, ProcessingStatus::Failed);

    let events = h.alerts.events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, AlertEvent::FailureThresholdExceeded { failed: 2, total: 3, .. })));
}

/// Client that snapshots the persisted summaries while its queries run.
struct SummaryWatchingClient {
    dal: DAL,
    seen: Mutex<Vec<ServiceSummary>>,
}

#[async_trait]
impl SubjectQuery for SummaryWatchingClient {
    async fn query(
        &self,
        _service: &ServiceEntry,
        _locator: &SubjectLocator,
        _date_from: NaiveDate,
        _date_to: NaiveDate,
    ) -> QueryOutcome {
        let requests = self.dal.requests().list().await.unwrap();
        let summaries = self
            .dal
            .service_summaries()
            .list_for_request(requests[0].id)
            .await
            .unwrap();
        self.seen.lock().unwrap().extend(summaries);
        QueryOutcome::NoData
    }
}

#[tokio::test]
async fn summaries_are_pending_while_aggregation_runs() {
    let database = test_database("pipeline_pending_slate").await;
    let dal = DAL::new(database.clone());
    let dir = tempfile::tempdir().unwrap();
    let watcher = Arc::new(SummaryWatchingClient {
        dal: DAL::new(database.clone()),
        seen: Mutex::new(Vec::new()),
    });

    let worker = PipelineWorker::new(
        DAL::new(database),
        registry(),
        watcher.clone(),
        templates(),
        Arc::new(FilesystemArtifactStore::new(dir.path())),
        Arc::new(RecordingNotifier::default()),
        config(),
    );

    let request = dal
        .requests()
        .create(new_request("SAR-2024-0042", "A1234BC", "v1"))
        .await
        .unwrap();

    let outcome = worker.process_next().await.unwrap();
    assert!(matches!(outcome, Some(CycleOutcome::Completed { .. })));

    // Every query saw the full Pending slate, one row per registered
    // service, written before the first downstream call.
    let seen = watcher.seen.lock().unwrap();
    assert_eq!(seen.len(), 9);
    assert!(seen
        .iter()
        .all(|s| s.processing_status == ProcessingStatus::Pending && !s.data_held));

    // After the cycle, the slate has been replaced with terminal statuses.
    let summaries = dal
        .service_summaries()
        .list_for_request(request.id)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 3);
    assert!(summaries
        .iter()
        .all(|s| s.processing_status == ProcessingStatus::Completed));
}

#[tokio::test]
async fn auth_failures_complete_with_an_alert() {
    let h = harness(
        "pipeline_auth",
        HashMap::from([
            ("custody".to_string(), QueryOutcome::NoData),
            ("probation".to_string(), QueryOutcome::NoData),
            (
                "health".to_string(),
                QueryOutcome::AuthFailure("authentication rejected (401)".into()),
            ),
        ]),
    )
    .await;

    let request = h
        .dal
        .requests()
        .create(new_request("SAR-2024-0042", "A1234BC", "v1"))
        .await
        .unwrap();

    // 1 of 3 failures is under the threshold; the report is produced with an
    // error notice for the rejected service, and the rejection is alerted.
    let outcome = h.worker.process_next().await.unwrap();
    assert!(matches!(outcome, Some(CycleOutcome::Completed { .. })));

    let stored = h.dal.requests().get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);

    let events = h.alerts.events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        AlertEvent::AuthRejected { service_name, .. } if service_name == "health"
    )));
}
