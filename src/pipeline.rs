use crate::models::{AccessRecord, AuditRecord, SparePartRecord};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One displayable cell, typed so the sort step can pick the right ordering.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(number) => number.to_string(),
        }
    }

    fn compare(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            _ => self.as_text().cmp(&other.as_text()),
        }
    }
}

/// Rows the pipeline can search, filter, and sort.
pub trait TableRow {
    fn searchable_fields() -> &'static [&'static str];
    fn field(&self, name: &str) -> FieldValue;
}

/// Current search/filter/sort selection for one view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub filters: HashMap<String, String>,
    #[serde(default)]
    pub sort_key: String,
    #[serde(default)]
    pub descending: bool,
}

fn filter_active(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && !trimmed.eq_ignore_ascii_case("all")
        && !trimmed.eq_ignore_ascii_case("todos")
}

fn matches_search<R: TableRow>(row: &R, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    R::searchable_fields()
        .iter()
        .any(|field| row.field(field).as_text().to_lowercase().contains(term))
}

fn matches_filters<R: TableRow>(row: &R, filters: &HashMap<String, String>) -> bool {
    filters
        .iter()
        .filter(|(_, expected)| filter_active(expected))
        .all(|(field, expected)| row.field(field).as_text() == expected.trim())
}

/// Full recomputation every call: search, then categorical filters, then a
/// stable sort. Ties keep source order, so repeating the same key and
/// direction never reorders equal rows.
pub fn run_table_query<R: TableRow + Clone>(rows: &[R], query: &TableQuery) -> Vec<R> {
    let term = query.search.trim().to_lowercase();
    let mut out: Vec<R> = rows
        .iter()
        .filter(|row| matches_search(*row, term.as_str()))
        .filter(|row| matches_filters(*row, &query.filters))
        .cloned()
        .collect();

    let sort_key = query.sort_key.trim();
    if !sort_key.is_empty() {
        out.sort_by(|a, b| {
            let ordering = a.field(sort_key).compare(&b.field(sort_key));
            if query.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
    out
}

impl TableRow for AuditRecord {
    fn searchable_fields() -> &'static [&'static str] {
        &["auditor", "admin_name", "observations"]
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "auditor" => FieldValue::Text(self.auditor.clone()),
            "admin_name" => FieldValue::Text(self.admin_name.clone()),
            "audit_date" => FieldValue::Text(self.audit_date.clone()),
            "status" => FieldValue::Text(self.status.to_string()),
            "score" => FieldValue::Number(self.score as f64),
            "location_id" => FieldValue::Text(self.location_id.clone().unwrap_or_default()),
            "observations" => FieldValue::Text(self.observations.clone()),
            _ => FieldValue::Text(String::new()),
        }
    }
}

fn millis_value(text: &str) -> FieldValue {
    FieldValue::Number(text.trim().parse::<f64>().unwrap_or(0.0))
}

impl TableRow for AccessRecord {
    fn searchable_fields() -> &'static [&'static str] {
        &["name", "url", "username", "notes"]
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "name" => FieldValue::Text(self.name.clone()),
            "url" => FieldValue::Text(self.url.clone()),
            "username" => FieldValue::Text(self.username.clone().unwrap_or_default()),
            "kind" => FieldValue::Text(self.kind.to_string()),
            "notes" => FieldValue::Text(self.notes.clone()),
            "created_at" => millis_value(self.created_at.as_str()),
            "updated_at" => millis_value(self.updated_at.as_str()),
            _ => FieldValue::Text(String::new()),
        }
    }
}

impl TableRow for SparePartRecord {
    fn searchable_fields() -> &'static [&'static str] {
        &[
            "name",
            "part_number",
            "description",
            "manufacturer",
            "location",
            "supplier",
        ]
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "name" => FieldValue::Text(self.name.clone()),
            "part_number" => FieldValue::Text(self.part_number.clone()),
            "description" => FieldValue::Text(self.description.clone()),
            "manufacturer" => FieldValue::Text(self.manufacturer.clone()),
            "category" => FieldValue::Text(self.category.to_string()),
            "unit" => FieldValue::Text(self.unit.to_string()),
            "location" => FieldValue::Text(self.location.clone()),
            "supplier" => FieldValue::Text(self.supplier.clone()),
            "notes" => FieldValue::Text(self.notes.clone()),
            "quantity" => FieldValue::Number(self.quantity as f64),
            "min_quantity" => FieldValue::Number(self.min_quantity as f64),
            "unit_price" => FieldValue::Number(self.unit_price),
            "created_at" => millis_value(self.created_at.as_str()),
            "updated_at" => millis_value(self.updated_at.as_str()),
            _ => FieldValue::Text(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessKind, PartCategory};

    fn part(name: &str, number: &str, category: PartCategory, quantity: i64) -> SparePartRecord {
        SparePartRecord {
            id: format!("id-{name}"),
            name: name.to_string(),
            part_number: number.to_string(),
            category,
            quantity,
            ..SparePartRecord::default()
        }
    }

    fn sample_parts() -> Vec<SparePartRecord> {
        vec![
            part("Correa dentada", "CD-10", PartCategory::Mecanico, 7),
            part("Fusible 10A", "FU-10", PartCategory::Electrico, 30),
            part("Correa lisa", "CL-22", PartCategory::Mecanico, 2),
            part("Aceite hidraulico", "AH-01", PartCategory::Hidraulico, 12),
        ]
    }

    #[test]
    fn search_matches_any_configured_field_case_insensitively() {
        let parts = sample_parts();
        let query = TableQuery {
            search: "correa".to_string(),
            ..TableQuery::default()
        };
        let result = run_table_query(parts.as_slice(), &query);
        assert_eq!(result.len(), 2);
        for row in &result {
            let hit = SparePartRecord::searchable_fields()
                .iter()
                .any(|field| row.field(field).as_text().to_lowercase().contains("correa"));
            assert!(hit);
        }

        // Part-number hits count too.
        let query = TableQuery {
            search: "fu-10".to_string(),
            ..TableQuery::default()
        };
        let result = run_table_query(parts.as_slice(), &query);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Fusible 10A");
    }

    #[test]
    fn excluded_rows_contain_the_term_nowhere() {
        let parts = sample_parts();
        let query = TableQuery {
            search: "correa".to_string(),
            ..TableQuery::default()
        };
        let kept: Vec<String> = run_table_query(parts.as_slice(), &query)
            .into_iter()
            .map(|row| row.id)
            .collect();
        for row in parts.iter().filter(|row| !kept.contains(&row.id)) {
            for field in SparePartRecord::searchable_fields() {
                assert!(!row.field(field).as_text().to_lowercase().contains("correa"));
            }
        }
    }

    #[test]
    fn categorical_filters_are_exact_and_anded() {
        let parts = sample_parts();
        let mut filters = HashMap::new();
        filters.insert("category".to_string(), "mecanico".to_string());
        let query = TableQuery {
            filters,
            ..TableQuery::default()
        };
        let result = run_table_query(parts.as_slice(), &query);
        assert_eq!(result.len(), 2);
        for row in &result {
            assert_eq!(row.category, PartCategory::Mecanico);
        }
    }

    #[test]
    fn all_and_empty_filter_values_are_skipped() {
        let parts = sample_parts();
        for sentinel in ["all", "ALL", "todos", ""] {
            let mut filters = HashMap::new();
            filters.insert("category".to_string(), sentinel.to_string());
            let query = TableQuery {
                filters,
                ..TableQuery::default()
            };
            assert_eq!(run_table_query(parts.as_slice(), &query).len(), parts.len());
        }
    }

    #[test]
    fn sort_is_stable_and_direction_reverses_unequal_elements() {
        let parts = vec![
            part("B primero", "X-1", PartCategory::Otros, 5),
            part("A segundo", "X-2", PartCategory::Otros, 5),
            part("C tercero", "X-3", PartCategory::Otros, 1),
        ];
        let query = TableQuery {
            sort_key: "quantity".to_string(),
            ..TableQuery::default()
        };
        let ascending = run_table_query(parts.as_slice(), &query);
        assert_eq!(ascending[0].name, "C tercero");
        // Equal quantities keep source order.
        assert_eq!(ascending[1].name, "B primero");
        assert_eq!(ascending[2].name, "A segundo");

        // Sorting again with the same key/direction is a fixed point.
        let again = run_table_query(ascending.as_slice(), &query);
        let names: Vec<&str> = again.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["C tercero", "B primero", "A segundo"]);

        let descending = run_table_query(
            parts.as_slice(),
            &TableQuery {
                sort_key: "quantity".to_string(),
                descending: true,
                ..TableQuery::default()
            },
        );
        // Non-equal elements reverse; the equal pair keeps source order.
        assert_eq!(descending[0].name, "B primero");
        assert_eq!(descending[1].name, "A segundo");
        assert_eq!(descending[2].name, "C tercero");
    }

    #[test]
    fn text_and_date_keys_sort_lexicographically() {
        let mut audits = Vec::new();
        for (auditor, date) in [
            ("Marta", "2026-03-01"),
            ("Alonso", "2026-01-15"),
            ("Lucia", "2026-02-10"),
        ] {
            audits.push(AuditRecord {
                id: format!("a-{auditor}"),
                auditor: auditor.to_string(),
                audit_date: date.to_string(),
                ..AuditRecord::default()
            });
        }
        let by_date = run_table_query(
            audits.as_slice(),
            &TableQuery {
                sort_key: "audit_date".to_string(),
                descending: true,
                ..TableQuery::default()
            },
        );
        assert_eq!(by_date[0].audit_date, "2026-03-01");
        assert_eq!(by_date[2].audit_date, "2026-01-15");

        let by_name = run_table_query(
            audits.as_slice(),
            &TableQuery {
                sort_key: "auditor".to_string(),
                ..TableQuery::default()
            },
        );
        assert_eq!(by_name[0].auditor, "Alonso");
    }

    #[test]
    fn access_search_covers_url_and_username() {
        let records = vec![
            AccessRecord {
                id: "1".to_string(),
                name: "Portal MTC".to_string(),
                url: "https://mtc.example.com/login".to_string(),
                username: Some("operador".to_string()),
                kind: AccessKind::Web,
                ..AccessRecord::default()
            },
            AccessRecord {
                id: "2".to_string(),
                name: "FTP reportes".to_string(),
                url: "ftp://files.example.com".to_string(),
                kind: AccessKind::Ftp,
                ..AccessRecord::default()
            },
        ];
        let query = TableQuery {
            search: "OPERADOR".to_string(),
            ..TableQuery::default()
        };
        let result = run_table_query(records.as_slice(), &query);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "1");
    }
}
