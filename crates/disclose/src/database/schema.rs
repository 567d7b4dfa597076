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

//! Diesel schema for the request store.
//!
//! UUIDs are stored as BLOB, timestamps as RFC3339 TEXT, and dates as
//! `%Y-%m-%d` TEXT. Conversions live in [`super::types`].

diesel::table! {
    requests (id) {
        id -> Binary,
        case_reference -> Text,
        subject_name -> Text,
        nomis_id -> Nullable<Text>,
        ndelius_id -> Nullable<Text>,
        date_from -> Text,
        date_to -> Text,
        version_tag -> Text,
        status -> Text,
        requested_at -> Text,
        claimed_at -> Nullable<Text>,
        claim_attempts -> Integer,
        failure_reason -> Nullable<Text>,
        artifact_ref -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    service_summaries (id) {
        id -> Binary,
        request_id -> Binary,
        service_name -> Text,
        position -> Integer,
        processing_status -> Text,
        data_held -> Bool,
        created_at -> Text,
    }
}

diesel::joinable!(service_summaries -> requests (request_id));

diesel::allow_tables_to_appear_in_same_query!(requests, service_summaries);
