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

//! Shared test fixtures.
//!
//! Each test gets its own shared-cache in-memory SQLite database; the pool
//! keeps a connection open for the lifetime of the `Database`, which keeps
//! the in-memory schema alive across pooled connections.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use disclose::database::Database;
use disclose::models::NewAccessRequest;

static DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Creates a fresh migrated database unique to the calling test.
pub async fn test_database(label: &str) -> Database {
    let n = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let url = format!("file:{}_{}?mode=memory&cache=shared", label, n);
    let database = Database::new(&url, 5);
    database
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    database
}

/// A valid intake payload; vary `nomis_id` or `version` to avoid the
/// duplicate check.
pub fn new_request(case_reference: &str, nomis_id: &str, version: &str) -> NewAccessRequest {
    NewAccessRequest {
        case_reference: case_reference.to_string(),
        subject_name: "Sam Subject".to_string(),
        nomis_id: Some(nomis_id.to_string()),
        ndelius_id: None,
        date_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        date_to: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        version: version.to_string(),
    }
}
