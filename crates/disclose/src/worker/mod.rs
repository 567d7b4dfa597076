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

//! Pipeline orchestrator.
//!
//! Drives one request end to end: claim, aggregate, threshold policy,
//! compose, store artifact, complete/fail. Each loop iteration processes at
//! most one request, which keeps backpressure simple and bounds resource
//! use per cycle. A crash mid-cycle leaves the request Claimed; staleness
//! reclaim is the sole crash-recovery mechanism.

pub mod config;

pub use config::{WorkerConfig, WorkerConfigBuilder};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::{Aggregation, Aggregator};
use crate::alert::{AlertEvent, AlertNotifier};
use crate::artifact::ArtifactStore;
use crate::client::{QueryOutcome, SubjectQuery};
use crate::dal::DAL;
use crate::error::{PipelineError, StoreError};
use crate::models::{AccessRequest, NewServiceSummary, ProcessingStatus};
use crate::registry::ServiceRegistry;
use crate::report::{ReportComposer, TemplateStore};

/// What one worker cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed {
        request_id: Uuid,
        artifact_ref: String,
        page_count: usize,
        overall_data_held: bool,
    },
    Failed {
        request_id: Uuid,
        reason: String,
    },
}

/// The top-level pipeline driver.
pub struct PipelineWorker {
    dal: DAL,
    registry: Arc<ServiceRegistry>,
    aggregator: Aggregator,
    composer: ReportComposer,
    artifacts: Arc<dyn ArtifactStore>,
    alerts: Arc<dyn AlertNotifier>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl PipelineWorker {
    pub fn new(
        dal: DAL,
        registry: Arc<ServiceRegistry>,
        client: Arc<dyn SubjectQuery>,
        templates: TemplateStore,
        artifacts: Arc<dyn ArtifactStore>,
        alerts: Arc<dyn AlertNotifier>,
        config: WorkerConfig,
    ) -> Self {
        let aggregator = Aggregator::new(registry.clone(), client, config.aggregation().clone());
        let composer = ReportComposer::new(templates);

        Self {
            dal,
            registry,
            aggregator,
            composer,
            artifacts,
            alerts,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals the run loop to stop after the current cycle.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Runs the worker loop until shutdown.
    ///
    /// Store-level errors are logged and the loop keeps polling; a broken
    /// database connection must not take the worker down for good.
    pub async fn run(&self) {
        let mut interval = time::interval(self.config.poll_interval());
        info!(
            poll_interval_ms = self.config.poll_interval().as_millis() as u64,
            "Pipeline worker started"
        );

        loop {
            interval.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Pipeline worker shutting down");
                break;
            }

            match self.process_next().await {
                Ok(Some(outcome)) => debug!(?outcome, "Cycle finished"),
                Ok(None) => debug!("No eligible requests"),
                Err(e) => error!(error = %e, "Worker cycle failed"),
            }
        }
    }

    /// Claims and processes at most one request.
    ///
    /// Returns `Ok(None)` when no eligible request exists. Request-level
    /// failures (threshold, render, artifact store) fail the claimed
    /// request and report `CycleOutcome::Failed`; store-level errors
    /// propagate to the caller.
    pub async fn process_next(&self) -> Result<Option<CycleOutcome>, PipelineError> {
        let Some(request) = self
            .dal
            .requests()
            .claim_next(self.config.stale_after())
            .await?
        else {
            return Ok(None);
        };

        let epoch = request.claim_epoch();

        if request.claim_attempts >= self.config.claim_alert_threshold() {
            self.alerts
                .notify(AlertEvent::RepeatedClaims {
                    request_id: request.id,
                    claim_attempts: request.claim_attempts,
                })
                .await;
        }

        match self.fulfil(&request).await {
            Ok((artifact_ref, page_count, overall_data_held)) => {
                self.dal
                    .requests()
                    .complete(request.id, epoch, &artifact_ref)
                    .await?;

                info!(
                    request_id = %request.id,
                    case_reference = %request.case_reference,
                    page_count,
                    overall_data_held,
                    claim_attempts = request.claim_attempts,
                    "Access request fulfilled"
                );

                Ok(Some(CycleOutcome::Completed {
                    request_id: request.id,
                    artifact_ref,
                    page_count,
                    overall_data_held,
                }))
            }
            Err(PipelineError::Store(e)) => Err(PipelineError::Store(e)),
            Err(request_failure) => {
                let reason = request_failure.to_string();
                warn!(
                    request_id = %request.id,
                    %reason,
                    "Request-level failure, leaving request for manual reclaim"
                );
                self.dal.requests().fail(request.id, epoch, &reason).await?;

                Ok(Some(CycleOutcome::Failed {
                    request_id: request.id,
                    reason,
                }))
            }
        }
    }

    /// The fallible middle of a cycle: aggregate, record summaries, apply
    /// the threshold policy, compose, store the artifact.
    async fn fulfil(
        &self,
        request: &AccessRequest,
    ) -> Result<(String, usize, bool), PipelineError> {
        // Pending slate first: readers see one row per registered service
        // for the whole aggregation window, not a gap until terminal
        // statuses land.
        let slate: Vec<NewServiceSummary> = self
            .registry
            .services()
            .iter()
            .map(|service| NewServiceSummary {
                service_name: service.name.clone(),
                processing_status: ProcessingStatus::Pending,
                data_held: false,
            })
            .collect();
        self.dal
            .service_summaries()
            .replace_for_request(request.id, slate)
            .await?;

        let aggregation = self.aggregator.aggregate(request).await;
        self.raise_auth_alerts(request, &aggregation).await;

        // Summaries record what actually happened even when the request
        // subsequently fails the threshold policy.
        self.dal
            .service_summaries()
            .replace_for_request(request.id, aggregation.summaries())
            .await?;

        let failed = aggregation.failed_count();
        let total = aggregation.results.len();
        if total > 0 && (failed as f64) / (total as f64) > self.config.failure_threshold() {
            self.alerts
                .notify(AlertEvent::FailureThresholdExceeded {
                    request_id: request.id,
                    failed,
                    total,
                })
                .await;
            return Err(PipelineError::FailureThresholdExceeded { failed, total });
        }

        let report = match self.composer.compose(request, &aggregation.results) {
            Ok(report) => report,
            Err(e) => {
                self.alerts
                    .notify(AlertEvent::RenderFailed {
                        request_id: request.id,
                        detail: e.to_string(),
                    })
                    .await;
                return Err(e.into());
            }
        };
        let page_count = report.page_count;

        let key = format!("{}/{}.txt", request.case_reference, request.id);
        let artifact_ref = match self.artifacts.put(&key, report.bytes).await {
            Ok(reference) => reference,
            Err(e) => {
                self.alerts
                    .notify(AlertEvent::ArtifactStoreFailed {
                        request_id: request.id,
                        detail: e.to_string(),
                    })
                    .await;
                return Err(e.into());
            }
        };

        Ok((artifact_ref, page_count, aggregation.overall_data_held()))
    }

    async fn raise_auth_alerts(&self, request: &AccessRequest, aggregation: &Aggregation) {
        for result in aggregation.auth_failures() {
            let detail = match &result.outcome {
                QueryOutcome::AuthFailure(detail) => detail.clone(),
                _ => String::new(),
            };
            self.alerts
                .notify(AlertEvent::AuthRejected {
                    request_id: request.id,
                    service_name: result.service_name.clone(),
                    detail,
                })
                .await;
        }
    }

    /// Backlog counts passthrough for the intake surface.
    pub async fn counts(&self) -> Result<crate::models::RequestCounts, StoreError> {
        self.dal.requests().counts().await
    }
}
