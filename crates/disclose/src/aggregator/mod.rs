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

//! Aggregation engine: fan-out querying of all registered services.
//!
//! One query per registered service, run concurrently under a semaphore
//! cap. Transient failures are retried with exponential backoff up to a
//! small bound; permanent and auth failures are terminal immediately. One
//! failing service never aborts the request: each service has its own
//! result slot and the orchestrator applies the failure-threshold policy.
//! Result order is normalized to registry order regardless of completion
//! order.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::client::{QueryOutcome, SubjectQuery};
use crate::models::{AccessRequest, NewServiceSummary, ProcessingStatus};
use crate::registry::{ServiceEntry, ServiceRegistry};

/// Fan-out behaviour knobs.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// Maximum in-flight downstream queries for one request.
    pub max_in_flight: usize,
    /// Additional attempts after the first for transient failures.
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay: Duration,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            retry_attempts: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Terminal outcome of one service for one request.
#[derive(Debug, Clone)]
pub struct ServiceResult {
    pub service_name: String,
    pub outcome: QueryOutcome,
}

impl ServiceResult {
    pub fn processing_status(&self) -> ProcessingStatus {
        if self.outcome.is_failure() {
            ProcessingStatus::Failed
        } else {
            ProcessingStatus::Completed
        }
    }

    pub fn data_held(&self) -> bool {
        self.outcome.data_held()
    }

    pub fn to_summary(&self) -> NewServiceSummary {
        NewServiceSummary {
            service_name: self.service_name.clone(),
            processing_status: self.processing_status(),
            data_held: self.data_held(),
        }
    }
}

/// Aggregated per-service results for one request, in registry order.
#[derive(Debug)]
pub struct Aggregation {
    pub results: Vec<ServiceResult>,
}

impl Aggregation {
    /// True iff at least one service holds data. Derived on demand; never
    /// stored, to avoid a second source of truth.
    pub fn overall_data_held(&self) -> bool {
        self.results.iter().any(|r| r.data_held())
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.processing_status() == ProcessingStatus::Failed)
            .count()
    }

    pub fn auth_failures(&self) -> Vec<&ServiceResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, QueryOutcome::AuthFailure(_)))
            .collect()
    }

    pub fn summaries(&self) -> Vec<NewServiceSummary> {
        self.results.iter().map(|r| r.to_summary()).collect()
    }
}

/// Runs the downstream query client across every registered service for one
/// request.
pub struct Aggregator {
    registry: Arc<ServiceRegistry>,
    client: Arc<dyn SubjectQuery>,
    config: AggregationConfig,
}

impl Aggregator {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        client: Arc<dyn SubjectQuery>,
        config: AggregationConfig,
    ) -> Self {
        Self {
            registry,
            client,
            config,
        }
    }

    /// Queries all registered services for the request's subject and window.
    ///
    /// Always returns exactly one result per registered service, in registry
    /// order. Sibling queries are never cancelled when one fails; partial
    /// results are kept.
    pub async fn aggregate(&self, request: &AccessRequest) -> Aggregation {
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut join_set: JoinSet<(usize, QueryOutcome)> = JoinSet::new();

        for (index, service) in self.registry.services().iter().enumerate() {
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let service = service.clone();
            let locator = request.locator.clone();
            let date_from = request.date_from;
            let date_to = request.date_to;
            let retry_attempts = self.config.retry_attempts;
            let retry_base_delay = self.config.retry_base_delay;

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("aggregation semaphore closed");

                let outcome = query_with_retry(
                    client.as_ref(),
                    &service,
                    &locator,
                    date_from,
                    date_to,
                    retry_attempts,
                    retry_base_delay,
                )
                .await;

                (index, outcome)
            });
        }

        // Slot per service: completion order is irrelevant, registry order
        // is restored here.
        let mut slots: Vec<Option<QueryOutcome>> = vec![None; self.registry.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => {
                    // A panicked query task must not sink the request; the
                    // affected slot is recorded as failed below.
                    warn!(error = %e, "Downstream query task panicked");
                }
            }
        }

        let results = self
            .registry
            .services()
            .iter()
            .zip(slots)
            .map(|(service, slot)| ServiceResult {
                service_name: service.name.clone(),
                outcome: slot.unwrap_or_else(|| {
                    QueryOutcome::TransientFailure("query task aborted".to_string())
                }),
            })
            .collect();

        Aggregation { results }
    }
}

async fn query_with_retry(
    client: &dyn SubjectQuery,
    service: &ServiceEntry,
    locator: &crate::models::SubjectLocator,
    date_from: chrono::NaiveDate,
    date_to: chrono::NaiveDate,
    retry_attempts: u32,
    retry_base_delay: Duration,
) -> QueryOutcome {
    let mut outcome = client.query(service, locator, date_from, date_to).await;

    for attempt in 0..retry_attempts {
        if !outcome.is_transient() {
            return outcome;
        }

        let delay = backoff_delay(retry_base_delay, attempt);
        warn!(
            service = %service.name,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Transient downstream failure, retrying"
        );
        tokio::time::sleep(delay).await;

        outcome = client.query(service, locator, date_from, date_to).await;
    }

    if outcome.is_transient() {
        debug!(service = %service.name, "Retries exhausted, recording failure");
    }
    outcome
}

/// Exponential backoff with a little jitter to decorrelate workers.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_ms = if exp.as_millis() >= 4 {
        rand::thread_rng().gen_range(0..=(exp.as_millis() as u64 / 4))
    } else {
        0
    };
    exp + Duration::from_millis(jitter_ms)
}
