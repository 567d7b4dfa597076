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

//! Worker configuration.

use std::time::Duration;

use crate::aggregator::AggregationConfig;

/// Tuning knobs for the pipeline worker.
///
/// Built through [`WorkerConfigBuilder`]; the defaults suit a single
/// low-volume deployment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    poll_interval: Duration,
    stale_after: Duration,
    failure_threshold: f64,
    claim_alert_threshold: i32,
    aggregation: AggregationConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(30 * 60),
            failure_threshold: 0.5,
            claim_alert_threshold: 3,
            aggregation: AggregationConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// How often the worker polls for eligible requests.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Age after which a Claimed request is treated as abandoned and becomes
    /// claimable again.
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Fraction of failed services above which a request fails instead of
    /// producing a partial report.
    pub fn failure_threshold(&self) -> f64 {
        self.failure_threshold
    }

    /// Claim attempts at which the worker raises a repeated-claims alert.
    pub fn claim_alert_threshold(&self) -> i32 {
        self.claim_alert_threshold
    }

    pub fn aggregation(&self) -> &AggregationConfig {
        &self.aggregation
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Debug, Clone, Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn stale_after(mut self, stale_after: Duration) -> Self {
        self.config.stale_after = stale_after;
        self
    }

    pub fn failure_threshold(mut self, threshold: f64) -> Self {
        self.config.failure_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn claim_alert_threshold(mut self, attempts: i32) -> Self {
        self.config.claim_alert_threshold = attempts.max(1);
        self
    }

    pub fn aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.config.aggregation = aggregation;
        self
    }

    pub fn build(self) -> WorkerConfig {
        self.config
    }
}
