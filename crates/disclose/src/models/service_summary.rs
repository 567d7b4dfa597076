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

//! Per-service outcome summaries.
//!
//! One summary per registered service per request. Created Pending when a
//! request enters aggregation and written to its terminal status exactly
//! once, by the aggregation engine; nothing else mutates them.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Terminal processing state of one service for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Pending,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "Pending",
            ProcessingStatus::Completed => "Completed",
            ProcessingStatus::Failed => "Failed",
        }
    }

    pub fn parse(text: &str) -> Result<Self, StoreError> {
        match text {
            "Pending" => Ok(ProcessingStatus::Pending),
            "Completed" => Ok(ProcessingStatus::Completed),
            "Failed" => Ok(ProcessingStatus::Failed),
            other => Err(StoreError::Corrupt(format!(
                "unknown processing status '{}'",
                other
            ))),
        }
    }
}

/// A persisted per-service summary, ordered by registry position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub service_name: String,
    pub processing_status: ProcessingStatus,
    pub data_held: bool,
}

/// Summary row to persist; position is assigned from registry order.
#[derive(Debug, Clone)]
pub struct NewServiceSummary {
    pub service_name: String,
    pub processing_status: ProcessingStatus,
    pub data_held: bool,
}
