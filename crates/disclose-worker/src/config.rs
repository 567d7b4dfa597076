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

//! TOML configuration for the worker daemon.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use disclose::aggregator::AggregationConfig;
use disclose::worker::WorkerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub registry: RegistrySettings,
    pub templates: TemplateSettings,
    pub artifacts: ArtifactSettings,
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySettings {
    /// TOML file of `[[service]]` tables.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSettings {
    /// Directory of `{service}.tmpl` files.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactSettings {
    /// Root directory for stored reports.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    /// Bearer token for downstream services. When absent, the
    /// `DISCLOSE_CLIENT_TOKEN` environment variable is consulted instead.
    pub token: Option<String>,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            token: None,
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl ClientSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WorkerSettings {
    pub poll_interval_secs: Option<u64>,
    pub stale_after_secs: Option<u64>,
    pub failure_threshold: Option<f64>,
    pub claim_alert_threshold: Option<i32>,
    pub max_in_flight: Option<usize>,
    pub retry_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
}

impl WorkerSettings {
    /// Applies the configured overrides on top of the library defaults.
    pub fn to_worker_config(&self) -> WorkerConfig {
        let defaults = AggregationConfig::default();
        let aggregation = AggregationConfig {
            max_in_flight: self.max_in_flight.unwrap_or(defaults.max_in_flight),
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            retry_base_delay: self
                .retry_base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
        };

        let mut builder = WorkerConfig::builder().aggregation(aggregation);
        if let Some(secs) = self.poll_interval_secs {
            builder = builder.poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.stale_after_secs {
            builder = builder.stale_after(Duration::from_secs(secs));
        }
        if let Some(threshold) = self.failure_threshold {
            builder = builder.failure_threshold(threshold);
        }
        if let Some(attempts) = self.claim_alert_threshold {
            builder = builder.claim_alert_threshold(attempts);
        }
        builder.build()
    }
}

fn default_pool_size() -> usize {
    5
}

fn default_call_timeout_secs() -> u64 {
    30
}

impl Settings {
    pub fn from_toml_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", path.display(), e))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config {}: {}", path.display(), e))?;
        Ok(settings)
    }
}
