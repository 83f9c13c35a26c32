use crate::models::{AccessRecord, AuditRecord, AuditStatus, SparePartRecord};
use serde::Serialize;
use std::collections::BTreeMap;

const RECENT_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Aggregates for the audit view header cards.
#[derive(Debug, Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub average_score: f64,
    pub critical: usize,
}

pub fn audit_stats(audits: &[AuditRecord]) -> AuditStats {
    let mut by_status = BTreeMap::new();
    let mut score_sum = 0_i64;
    let mut critical = 0;
    for audit in audits {
        *by_status.entry(audit.status.to_string()).or_insert(0) += 1;
        score_sum += audit.score;
        if audit.status == AuditStatus::Critical {
            critical += 1;
        }
    }
    let average_score = if audits.is_empty() {
        0.0
    } else {
        score_sum as f64 / audits.len() as f64
    };
    AuditStats {
        total: audits.len(),
        by_status,
        average_score,
        critical,
    }
}

/// Aggregates for the MTC access view.
#[derive(Debug, Serialize)]
pub struct AccessStats {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub with_credentials: usize,
    pub recent: usize,
}

/// `now_ms` is sampled once per computation; the window does not track the
/// wall clock while the view stays open.
pub fn access_stats(records: &[AccessRecord], now_ms: i64) -> AccessStats {
    let cutoff = now_ms - RECENT_WINDOW_MS;
    let mut by_kind = BTreeMap::new();
    let mut with_credentials = 0;
    let mut recent = 0;
    for record in records {
        *by_kind.entry(record.kind.to_string()).or_insert(0) += 1;
        if record.has_full_credentials() {
            with_credentials += 1;
        }
        let created = record.created_at.trim().parse::<i64>().unwrap_or(0);
        if created >= cutoff {
            recent += 1;
        }
    }
    AccessStats {
        total: records.len(),
        by_kind,
        with_credentials,
        recent,
    }
}

/// Aggregates for the spare-parts view.
#[derive(Debug, Serialize)]
pub struct PartStats {
    pub total: usize,
    pub low_stock: usize,
    pub by_category: BTreeMap<String, usize>,
    pub total_value: f64,
}

pub fn part_stats(parts: &[SparePartRecord]) -> PartStats {
    let mut by_category = BTreeMap::new();
    let mut low_stock = 0;
    let mut total_value = 0.0;
    for part in parts {
        *by_category.entry(part.category.to_string()).or_insert(0) += 1;
        if part.is_low_stock() {
            low_stock += 1;
        }
        total_value += part.quantity as f64 * part.unit_price;
    }
    PartStats {
        total: parts.len(),
        low_stock,
        by_category,
        total_value,
    }
}
