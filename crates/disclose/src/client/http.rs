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

//! HTTP transport for downstream subject-access queries.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{classify_response, QueryOutcome, SubjectQuery};
use crate::models::SubjectLocator;
use crate::registry::ServiceEntry;

const QUERY_PATH: &str = "subject-access-request";
const DATE_PARAM_FORMAT: &str = "%Y-%m-%d";

/// Supplies the bearer token attached to downstream calls.
///
/// The auth server integration behind this seam is an external collaborator;
/// the pipeline only needs a token string per call.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, String>;
}

/// Fixed-token source for environments where the credential is injected
/// directly (and for tests).
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String, String> {
        Ok(self.token.clone())
    }
}

/// Downstream query client over HTTP.
///
/// Each call is bounded by `call_timeout`; exceeding it, or any transport
/// error, is a `TransientFailure`.
pub struct HttpQueryClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

impl HttpQueryClient {
    pub fn new(call_timeout: Duration, tokens: Arc<dyn TokenSource>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self { http, tokens }
    }

    fn query_url(service: &ServiceEntry) -> String {
        format!(
            "{}/{}",
            service.base_url.trim_end_matches('/'),
            QUERY_PATH
        )
    }
}

#[async_trait]
impl SubjectQuery for HttpQueryClient {
    async fn query(
        &self,
        service: &ServiceEntry,
        locator: &SubjectLocator,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> QueryOutcome {
        let token = match self.tokens.token().await {
            Ok(token) => token,
            Err(reason) => {
                warn!(service = %service.name, %reason, "Token acquisition failed");
                return QueryOutcome::AuthFailure(format!("token acquisition failed: {}", reason));
            }
        };

        let mut params: Vec<(&str, String)> = Vec::with_capacity(4);
        if let Some(prn) = &locator.nomis_id {
            params.push(("prn", prn.clone()));
        }
        if let Some(crn) = &locator.ndelius_id {
            params.push(("crn", crn.clone()));
        }
        params.push(("fromDate", date_from.format(DATE_PARAM_FORMAT).to_string()));
        params.push(("toDate", date_to.format(DATE_PARAM_FORMAT).to_string()));

        let url = Self::query_url(service);
        debug!(service = %service.name, %url, "Issuing downstream query");

        let response = match self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Covers connect errors, timeouts and protocol failures.
                warn!(service = %service.name, error = %e, "Downstream query transport error");
                return QueryOutcome::TransientFailure(e.to_string());
            }
        };

        let status = response.status();
        let body = if status == StatusCode::OK {
            response.json::<Value>().await.ok()
        } else {
            None
        };

        classify_response(status.as_u16(), body)
    }
}
