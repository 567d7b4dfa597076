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

//! Report composition.
//!
//! The composed report is ephemeral: produced fresh per request, handed to
//! the artifact store as opaque bytes, never persisted as a domain entity.

pub mod composer;
pub mod template;

pub use composer::{ComposedReport, ReportComposer};
pub use template::TemplateStore;
