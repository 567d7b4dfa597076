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

//! Operator alerting.
//!
//! Alert-worthy failures (auth rejections, render failures, threshold
//! breaches, repeatedly failing requests) are forwarded to an
//! [`AlertNotifier`]; none are swallowed. The default implementation logs
//! at error level; deployments plug in their paging integration here.

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

/// Alert-worthy pipeline events.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    /// A downstream service rejected our credentials; indicates credential
    /// or config drift, not load.
    AuthRejected {
        request_id: Uuid,
        service_name: String,
        detail: String,
    },
    /// Too many services failed for one request.
    FailureThresholdExceeded {
        request_id: Uuid,
        failed: usize,
        total: usize,
    },
    /// The composed document was degenerate.
    RenderFailed { request_id: Uuid, detail: String },
    /// A request keeps being claimed without completing.
    RepeatedClaims {
        request_id: Uuid,
        claim_attempts: i32,
    },
    /// Uploading the composed report failed.
    ArtifactStoreFailed { request_id: Uuid, detail: String },
}

/// External alerting collaborator.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, event: AlertEvent);
}

/// Default notifier: structured error logs.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, event: AlertEvent) {
        match &event {
            AlertEvent::AuthRejected {
                request_id,
                service_name,
                detail,
            } => error!(
                %request_id,
                service = %service_name,
                detail,
                "ALERT: downstream authentication rejected"
            ),
            AlertEvent::FailureThresholdExceeded {
                request_id,
                failed,
                total,
            } => error!(
                %request_id,
                failed,
                total,
                "ALERT: per-service failure threshold exceeded"
            ),
            AlertEvent::RenderFailed { request_id, detail } => error!(
                %request_id,
                detail,
                "ALERT: report rendering failed"
            ),
            AlertEvent::RepeatedClaims {
                request_id,
                claim_attempts,
            } => error!(
                %request_id,
                claim_attempts,
                "ALERT: request repeatedly claimed without completing"
            ),
            AlertEvent::ArtifactStoreFailed { request_id, detail } => error!(
                %request_id,
                detail,
                "ALERT: artifact store write failed"
            ),
        }
    }
}
