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

//! Two-pass report composition.
//!
//! Pass one renders one section per service (template-backed for data held,
//! placeholder for no-data / failed / missing template) and folds the
//! combined lines into fixed-height pages. Pass two stamps every finalized
//! page with the header and footer, which need the final page count for
//! their `Page i of n` marker. The two stages are kept separate on purpose:
//! header content is identical on every page but positioned against final
//! page geometry.

use tracing::warn;

use crate::aggregator::ServiceResult;
use crate::client::QueryOutcome;
use crate::error::RenderError;
use crate::models::AccessRequest;
use crate::report::template::TemplateStore;

/// Content lines per page, excluding the stamped header and footer.
const DEFAULT_LINES_PER_PAGE: usize = 40;
/// Stamped page width; the case reference is right-aligned against this.
const PAGE_WIDTH: usize = 80;
/// Page separator in the byte stream.
const FORM_FEED: char = '\u{000C}';

/// A finished report: opaque bytes plus the page count used for audit
/// logging and degenerate-output validation.
#[derive(Debug)]
pub struct ComposedReport {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Renders composite reports from per-service aggregation results.
pub struct ReportComposer {
    templates: TemplateStore,
    lines_per_page: usize,
}

impl ReportComposer {
    pub fn new(templates: TemplateStore) -> Self {
        Self {
            templates,
            lines_per_page: DEFAULT_LINES_PER_PAGE,
        }
    }

    /// Overrides the page height. Intended for tests and unusual layouts.
    pub fn with_lines_per_page(mut self, lines_per_page: usize) -> Self {
        self.lines_per_page = lines_per_page.max(1);
        self
    }

    /// Composes the report for one request.
    ///
    /// One section per service, in the order given (registry order).
    /// Never fails because a section's template is missing; a zero-page
    /// output is a `RenderError` because an empty disclosure document must
    /// never be uploaded.
    pub fn compose(
        &self,
        request: &AccessRequest,
        results: &[ServiceResult],
    ) -> Result<ComposedReport, RenderError> {
        let mut lines: Vec<String> = Vec::new();
        for result in results {
            self.render_section(request, result, &mut lines);
        }

        let pages = paginate(&lines, self.lines_per_page);
        if pages.is_empty() {
            return Err(RenderError::EmptyDocument {
                case_reference: request.case_reference.clone(),
            });
        }

        let page_count = pages.len();
        let stamped = stamp_pages(request, pages);

        Ok(ComposedReport {
            bytes: stamped.into_bytes(),
            page_count,
        })
    }

    fn render_section(
        &self,
        request: &AccessRequest,
        result: &ServiceResult,
        lines: &mut Vec<String>,
    ) {
        lines.push(format!("SERVICE: {}", result.service_name));
        lines.push("-".repeat(PAGE_WIDTH));

        match &result.outcome {
            QueryOutcome::DataHeld(payload) => {
                match self.templates.render(&result.service_name, payload) {
                    Ok(rendered) => {
                        lines.extend(rendered.lines().map(str::to_string));
                    }
                    Err(e) => {
                        // Missing/unreadable template is never fatal; the
                        // section degrades to a placeholder.
                        warn!(
                            service = %result.service_name,
                            request_id = %request.id,
                            error = %e,
                            "Template unavailable, rendering placeholder section"
                        );
                        lines.push(
                            "Data is held by this service but its report template is unavailable."
                                .to_string(),
                        );
                        lines.push(
                            "Contact the data-protection team for a manual extract.".to_string(),
                        );
                    }
                }
            }
            QueryOutcome::NoData => {
                lines.push(
                    "No data is held by this service for the subject in the requested period."
                        .to_string(),
                );
            }
            QueryOutcome::TransientFailure(_)
            | QueryOutcome::PermanentFailure(_)
            | QueryOutcome::AuthFailure(_) => {
                lines.push(
                    "This service could not be queried; its records are not included.".to_string(),
                );
            }
        }

        lines.push(String::new());
    }
}

fn paginate(lines: &[String], lines_per_page: usize) -> Vec<Vec<String>> {
    lines
        .chunks(lines_per_page)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Pass two: header and footer on every page, now that the page count is
/// final.
fn stamp_pages(request: &AccessRequest, pages: Vec<Vec<String>>) -> String {
    let page_count = pages.len();
    let subject_id = request.locator.display_id().to_string();
    let case_line = format!("CASE REFERENCE: {}", request.case_reference);

    let mut output = String::new();
    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            output.push(FORM_FEED);
            output.push('\n');
        }

        output.push_str(&header_line(&subject_id, &case_line));
        output.push('\n');
        output.push_str(&format!("Page {} of {}", index + 1, page_count));
        output.push('\n');
        output.push('\n');

        for line in page {
            output.push_str(line);
            output.push('\n');
        }

        output.push('\n');
        output.push_str(&case_line);
        output.push('\n');
    }
    output
}

fn header_line(subject_id: &str, case_line: &str) -> String {
    let used = subject_id.len() + case_line.len();
    let padding = PAGE_WIDTH.saturating_sub(used).max(2);
    format!("{}{}{}", subject_id, " ".repeat(padding), case_line)
}
