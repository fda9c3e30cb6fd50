// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod runner;
pub mod scheduler;
pub mod transport;
pub mod types;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

use crate::ingest::types::{ImportOutcome, RawRecord};
use crate::model::{Connector, FieldMapping, Lead, STAGE_READY};
use crate::normalize::{normalize_dob, normalize_state, normalize_zip};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("lead_ingest_runs_total", "Connector runs by status.");
        describe_counter!("lead_ingest_fetched_total", "Raw records fetched from sources.");
        describe_counter!("lead_ingest_imported_total", "Leads newly stored.");
        describe_counter!(
            "lead_ingest_duplicates_total",
            "Records dropped because the fingerprint already existed."
        );
        describe_counter!(
            "lead_ingest_invalid_total",
            "Records dropped for a missing required field."
        );
        describe_counter!("lead_scheduler_ticks_total", "Scheduler ticks evaluated.");
        describe_histogram!("lead_ingest_fetch_ms", "Source fetch time in milliseconds.");
        describe_gauge!(
            "lead_ingest_last_run_ts",
            "Unix ts of the last finished connector run."
        );
    });
}

/// Minimal view of a connector needed to turn raw records into leads.
/// Ad-hoc CSV imports build one without a stored connector.
#[derive(Debug, Clone)]
pub struct ImportSource<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub mapping: &'a FieldMapping,
}

impl<'a> From<&'a Connector> for ImportSource<'a> {
    fn from(c: &'a Connector) -> Self {
        Self {
            id: &c.id,
            name: &c.name,
            mapping: &c.mapping,
        }
    }
}

/// Read a mapped value: exact key first, then a dotted path. Missing keys
/// and nulls read as an empty string.
fn source_value(record: &RawRecord, key: Option<&str>) -> String {
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return String::new();
    };
    let value = match record {
        RawRecord::Object(map) if map.contains_key(key) => map.get(key),
        _ if key.contains('.') => providers::pick_path(record, key),
        _ => None,
    };
    match value {
        None | Some(RawRecord::Null) => String::new(),
        Some(RawRecord::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Map one raw record through the connector's mapping. Returns `None` when a
/// required field is empty after normalization.
pub fn transform(record: &RawRecord, source: &ImportSource<'_>, now: DateTime<Utc>) -> Option<Lead> {
    let m = source.mapping;
    let get = |key: Option<&str>| source_value(record, key);

    let lead_source = get(m.lead_source.as_deref());
    let lead = Lead {
        id: uuid::Uuid::new_v4().to_string(),
        full_name: get(Some(&m.full_name)),
        street: get(Some(&m.street)),
        unit: get(m.unit.as_deref()),
        city: get(Some(&m.city)),
        state: normalize_state(&get(Some(&m.state))),
        zip: normalize_zip(&get(Some(&m.zip))),
        county: get(m.county.as_deref()),
        phone: get(m.phone.as_deref()),
        dob: normalize_dob(&get(m.dob.as_deref())),
        lead_source: if lead_source.is_empty() {
            source.name.to_string()
        } else {
            lead_source
        },
        provider: source.name.to_string(),
        connector_id: source.id.to_string(),
        stage: STAGE_READY.to_string(),
        imported_at: now,
    };

    let required = [&lead.full_name, &lead.street, &lead.city, &lead.state, &lead.zip];
    if required.iter().any(|v| v.is_empty()) {
        return None;
    }
    Some(lead)
}

/// Dedup identity: lower-cased name|street|city plus canonical state and zip.
pub fn fingerprint(lead: &Lead) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        lead.full_name.to_lowercase(),
        lead.street.to_lowercase(),
        lead.city.to_lowercase(),
        lead.state,
        lead.zip
    )
}

/// Transform, validate and dedup `raw_records` against `existing`.
/// Duplicates within the batch are caught as well.
pub fn import_batch(
    source: &ImportSource<'_>,
    existing: &[Lead],
    raw_records: &[RawRecord],
    now: DateTime<Utc>,
) -> ImportOutcome {
    let mut seen: HashSet<String> = existing.iter().map(fingerprint).collect();
    let mut out = ImportOutcome::default();

    for record in raw_records {
        let Some(lead) = transform(record, source, now) else {
            out.invalid_count += 1;
            continue;
        };
        if !seen.insert(fingerprint(&lead)) {
            out.duplicate_count += 1;
            continue;
        }
        out.imported.push(lead);
    }

    out
}

/// Newest imports first, then the existing set.
pub fn merge_leads(imported: Vec<Lead>, existing: Vec<Lead>) -> Vec<Lead> {
    let mut merged = imported;
    merged.extend(existing);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping() -> FieldMapping {
        serde_json::from_value(json!({
            "fullName": "Name", "street": "Street", "city": "City",
            "state": "State", "zip": "Zip", "dob": "DOB", "leadSource": "Src",
            "county": "meta.county"
        }))
        .unwrap()
    }

    fn src(m: &FieldMapping) -> ImportSource<'_> {
        ImportSource { id: "c1", name: "Vendor", mapping: m }
    }

    #[test]
    fn transform_normalizes_and_defaults_lead_source() {
        let m = mapping();
        let rec = json!({
            "Name": " Ann Lee ", "Street": "1 Main", "City": "Avon",
            "State": "oh", "Zip": "440111234", "DOB": "3/4/1958",
            "meta": {"county": "Lorain"}
        });
        let lead = transform(&rec, &src(&m), Utc::now()).unwrap();
        assert_eq!(lead.full_name, "Ann Lee");
        assert_eq!(lead.state, "OH");
        assert_eq!(lead.zip, "44011-1234");
        assert_eq!(lead.dob, "1958-03-04");
        assert_eq!(lead.county, "Lorain");
        assert_eq!(lead.lead_source, "Vendor");
        assert_eq!(lead.provider, "Vendor");
        assert_eq!(lead.connector_id, "c1");
        assert_eq!(lead.stage, STAGE_READY);
    }

    #[test]
    fn numeric_json_values_are_stringified() {
        let m = mapping();
        let rec = json!({"Name": "A", "Street": "S", "City": "C", "State": "OH", "Zip": 44011});
        let lead = transform(&rec, &src(&m), Utc::now()).unwrap();
        assert_eq!(lead.zip, "44011");
    }

    #[test]
    fn missing_required_field_is_invalid() {
        let m = mapping();
        for drop in ["Name", "Street", "City", "State", "Zip"] {
            let mut rec = json!({"Name": "A", "Street": "S", "City": "C", "State": "OH", "Zip": "44011"});
            rec.as_object_mut().unwrap().remove(drop);
            assert!(transform(&rec, &src(&m), Utc::now()).is_none(), "dropped {drop}");
        }
        // non-digit zip normalizes to empty
        let rec = json!({"Name": "A", "Street": "S", "City": "C", "State": "OH", "Zip": "n/a"});
        assert!(transform(&rec, &src(&m), Utc::now()).is_none());
    }

    #[test]
    fn fingerprint_is_case_insensitive_on_text_fields() {
        let m = mapping();
        let a = transform(
            &json!({"Name": "Ann LEE", "Street": "1 MAIN", "City": "avon", "State": "OH", "Zip": "44011"}),
            &src(&m),
            Utc::now(),
        )
        .unwrap();
        let b = transform(
            &json!({"Name": "ann lee", "Street": "1 main", "City": "Avon", "State": "oh", "Zip": "44011"}),
            &src(&m),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a), "ann lee|1 main|avon|OH|44011");
    }

    #[test]
    fn batch_counts_duplicates_and_invalid() {
        let m = mapping();
        let raw = vec![
            json!({"Name": "A", "Street": "S", "City": "C", "State": "OH", "Zip": "44011"}),
            json!({"Name": "a", "Street": "s", "City": "c", "State": "oh", "Zip": "44011"}),
            json!({"Name": "", "Street": "S", "City": "C", "State": "OH", "Zip": "44011"}),
            json!({"Name": "B", "Street": "S", "City": "C", "State": "OH", "Zip": "44011"}),
        ];
        let out = import_batch(&src(&m), &[], &raw, Utc::now());
        assert_eq!(out.imported.len(), 2);
        assert_eq!(out.imported[0].full_name, "A");
        assert_eq!(out.imported[1].full_name, "B");
        assert_eq!(out.duplicate_count, 1);
        assert_eq!(out.invalid_count, 1);
    }

    #[test]
    fn merge_puts_new_leads_first() {
        let m = mapping();
        let raw = vec![json!({"Name": "New", "Street": "S", "City": "C", "State": "OH", "Zip": "44011"})];
        let old = import_batch(
            &src(&m),
            &[],
            &[json!({"Name": "Old", "Street": "S", "City": "C", "State": "OH", "Zip": "44011"})],
            Utc::now(),
        )
        .imported;
        let fresh = import_batch(&src(&m), &old, &raw, Utc::now()).imported;
        let merged = merge_leads(fresh, old);
        assert_eq!(merged[0].full_name, "New");
        assert_eq!(merged[1].full_name, "Old");
    }
}
