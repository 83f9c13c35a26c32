use crate::models::{AccessRecord, AuditRecord, SparePartRecord};
use crate::store::{RecordStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

/// One field-level rejection, rendered inline next to the field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: String,
}

fn issue(field: &'static str, message: &str) -> FieldIssue {
    FieldIssue {
        field,
        message: message.to_string(),
    }
}

fn require(issues: &mut Vec<FieldIssue>, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        issues.push(issue(field, message));
    }
}

/// Per-field validation state exposed for presentation styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Unchecked,
    Checking,
    Valid,
    Invalid,
}

pub fn validate_audit(record: &AuditRecord) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    require(
        &mut issues,
        "auditor",
        record.auditor.as_str(),
        "Auditor name is required.",
    );
    require(
        &mut issues,
        "admin_name",
        record.admin_name.as_str(),
        "Administrator name is required.",
    );
    require(
        &mut issues,
        "audit_date",
        record.audit_date.as_str(),
        "Audit date is required.",
    );
    if !(0..=100).contains(&record.score) {
        issues.push(issue("score", "Score must be between 0 and 100."));
    }
    issues
}

fn is_absolute_url(value: &str) -> bool {
    Url::parse(value.trim()).is_ok()
}

/// Synchronous rules only; name uniqueness goes through
/// [`check_name_available`].
pub fn validate_access(record: &AccessRecord) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    require(
        &mut issues,
        "name",
        record.name.as_str(),
        "Name is required.",
    );
    if record.url.trim().is_empty() {
        issues.push(issue("url", "URL is required."));
    } else if !is_absolute_url(record.url.as_str()) {
        issues.push(issue("url", "URL must be a valid absolute URL."));
    }
    issues
}

pub fn validate_part(record: &SparePartRecord) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    require(
        &mut issues,
        "name",
        record.name.as_str(),
        "Part name is required.",
    );
    require(
        &mut issues,
        "part_number",
        record.part_number.as_str(),
        "Part number is required.",
    );
    if record.quantity < 0 {
        issues.push(issue("quantity", "Quantity must be 0 or greater."));
    }
    if record.min_quantity < 0 {
        issues.push(issue(
            "min_quantity",
            "Minimum quantity must be 0 or greater.",
        ));
    }
    if record.unit_price < 0.0 {
        issues.push(issue("unit_price", "Unit price must be 0 or greater."));
    }
    issues
}

/// Remote lookup behind the debounced name check: a trimmed, case-insensitive
/// match on any other record means the name is taken. Passing the record's own
/// id while editing excludes it from the scan.
pub fn check_name_available<S: RecordStore<AccessRecord>>(
    store: &mut S,
    name: &str,
    exclude_id: Option<&str>,
) -> Result<bool, StoreError> {
    let candidate = name.trim();
    if candidate.is_empty() {
        return Ok(false);
    }
    let records = store.list()?;
    let taken = records.iter().any(|record| {
        if Some(record.id.as_str()) == exclude_id {
            return false;
        }
        record.name.trim().eq_ignore_ascii_case(candidate)
    });
    Ok(!taken)
}

/// Supersession tracker for the per-keystroke async check: `begin` hands out a
/// ticket and invalidates every earlier one for that field, so only the last
/// scheduled check may publish its result.
#[derive(Debug, Default)]
pub struct DebounceGate {
    tickets: HashMap<String, u64>,
}

impl DebounceGate {
    pub fn new() -> DebounceGate {
        DebounceGate::default()
    }

    pub fn begin(&mut self, field: &str) -> u64 {
        let entry = self.tickets.entry(field.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn is_current(&self, field: &str, ticket: u64) -> bool {
        self.tickets.get(field).copied() == Some(ticket)
    }
}
