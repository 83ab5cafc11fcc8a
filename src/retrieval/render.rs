//! Formatting of selected entries into a labeled context block.

use std::fmt::Write as _;

use crate::constants::{MISSING_FIELD, NO_RECORDS_SENTINEL, RECORD_SEPARATOR};

use super::entry::CandidateEntry;

/// Renders entries as fixed per-field blocks.
///
/// Every label is always emitted; missing values become `N/A`. An empty input renders
/// [`NO_RECORDS_SENTINEL`] because prompt templates expect a non-empty block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextRenderer;

impl ContextRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, entries: &[CandidateEntry]) -> String {
        if entries.is_empty() {
            return NO_RECORDS_SENTINEL.to_string();
        }

        entries
            .iter()
            .map(|entry| self.render_entry(entry))
            .collect::<Vec<_>>()
            .join(RECORD_SEPARATOR)
    }

    pub fn render_entry(&self, entry: &CandidateEntry) -> String {
        let record = &entry.payload;
        let cwe = record.cwe.join(", ");
        let cvss = record.cvss.map(|score| score.to_string());

        let fields: [(&str, Option<&str>); 10] = [
            ("CVE", Some(entry.id.as_str())),
            ("Name", record.name.as_deref()),
            ("Description", record.description.as_deref()),
            ("Severity", record.severity.as_deref()),
            ("CVSS", cvss.as_deref()),
            ("Threat", record.threat.as_deref()),
            ("Mitigation", record.mitigation.as_deref()),
            ("Product", record.product.as_deref()),
            ("Version", record.version.as_deref()),
            ("CWE", Some(cwe.as_str())),
        ];

        let mut block = String::new();
        for (i, (label, value)) in fields.iter().enumerate() {
            if i > 0 {
                block.push('\n');
            }
            let value = value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(MISSING_FIELD);
            // Writing to a String cannot fail.
            let _ = write!(block, "{}: {}", label, value);
        }
        block
    }
}

/// Convenience wrapper around [`ContextRenderer::render`].
pub fn render(entries: &[CandidateEntry]) -> String {
    ContextRenderer::new().render(entries)
}
