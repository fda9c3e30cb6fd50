// src/query.rs
//! Lead filtering, batch pagination and CSV export.

use chrono::NaiveDate;
use serde::Serialize;

use crate::csv_codec;
use crate::model::Lead;
use crate::normalize::age;

/// Stage value that disables the stage filter.
pub const STAGE_ALL: &str = "ALL";

pub const EXPORT_COLUMNS: [&str; 13] = [
    "Full Name",
    "Street",
    "Unit",
    "City",
    "State",
    "ZIP",
    "County",
    "Phone",
    "DOB",
    "Age",
    "Provider",
    "Stage",
    "Imported At",
];

/// Filter criteria; all present predicates are ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadCriteria {
    /// Exact stage, or [`STAGE_ALL`].
    pub stage: String,
    /// Case-insensitive exact state; empty = any.
    pub state: String,
    /// Case-insensitive substring; empty = any.
    pub county: String,
    pub zip_prefix: String,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
}

impl Default for LeadCriteria {
    fn default() -> Self {
        Self {
            stage: STAGE_ALL.to_string(),
            state: String::new(),
            county: String::new(),
            zip_prefix: String::new(),
            min_age: None,
            max_age: None,
        }
    }
}

impl LeadCriteria {
    /// Does `lead` satisfy every predicate as of `today`?
    ///
    /// A lead whose age can't be derived passes the age bounds.
    pub fn matches(&self, lead: &Lead, today: NaiveDate) -> bool {
        let stage = self.stage.trim();
        if !stage.is_empty() && stage != STAGE_ALL && lead.stage != stage {
            return false;
        }
        let state = self.state.trim();
        if !state.is_empty() && !lead.state.eq_ignore_ascii_case(state) {
            return false;
        }
        let county = self.county.trim().to_lowercase();
        if !county.is_empty() && !lead.county.to_lowercase().contains(&county) {
            return false;
        }
        let zip_prefix = self.zip_prefix.trim();
        if !zip_prefix.is_empty() && !lead.zip.starts_with(zip_prefix) {
            return false;
        }
        if let Some(a) = age(&lead.dob, today) {
            if self.min_age.is_some_and(|min| a < min) || self.max_age.is_some_and(|max| a > max) {
                return false;
            }
        }
        true
    }
}

pub fn filter<'a>(leads: &'a [Lead], criteria: &LeadCriteria, today: NaiveDate) -> Vec<&'a Lead> {
    leads.iter().filter(|l| criteria.matches(l, today)).collect()
}

/// 1-indexed page of at most `batch_size` items. Size and page below 1 are
/// treated as 1; pages past the end are empty.
pub fn paginate<T>(items: &[T], batch_size: usize, batch_number: usize) -> &[T] {
    let size = batch_size.max(1);
    let page = batch_number.max(1);
    let start = (page - 1).saturating_mul(size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(size).min(items.len());
    &items[start..end]
}

/// Result of one filtered, paginated lead query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPage {
    pub total_stored: usize,
    pub total_filtered: usize,
    pub batch_size: usize,
    pub batch_number: usize,
    pub items: Vec<Lead>,
}

pub fn query(
    leads: &[Lead],
    criteria: &LeadCriteria,
    batch_size: usize,
    batch_number: usize,
    today: NaiveDate,
) -> LeadPage {
    let filtered = filter(leads, criteria, today);
    let batch_size = batch_size.max(1);
    let batch_number = batch_number.max(1);
    let items = paginate(&filtered, batch_size, batch_number)
        .iter()
        .map(|l| (*l).clone())
        .collect();
    LeadPage {
        total_stored: leads.len(),
        total_filtered: filtered.len(),
        batch_size,
        batch_number,
        items,
    }
}

fn export_row(lead: &Lead, today: NaiveDate) -> Vec<String> {
    vec![
        lead.full_name.clone(),
        lead.street.clone(),
        lead.unit.clone(),
        lead.city.clone(),
        lead.state.clone(),
        lead.zip.clone(),
        lead.county.clone(),
        lead.phone.clone(),
        lead.dob.clone(),
        age(&lead.dob, today).map(|a| a.to_string()).unwrap_or_default(),
        lead.provider.clone(),
        lead.stage.clone(),
        lead.imported_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    ]
}

/// CSV text for `leads` in the fixed export column order.
pub fn export_csv(leads: &[Lead], today: NaiveDate) -> anyhow::Result<String> {
    csv_codec::serialize(&EXPORT_COLUMNS, leads.iter().map(|l| export_row(l, today)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn lead(name: &str, state: &str, county: &str, zip: &str, dob: &str, stage: &str) -> Lead {
        Lead {
            id: name.to_lowercase(),
            full_name: name.into(),
            street: "1 Main".into(),
            unit: String::new(),
            city: "Avon".into(),
            state: state.into(),
            zip: zip.into(),
            county: county.into(),
            phone: String::new(),
            dob: dob.into(),
            lead_source: "t".into(),
            provider: "Vendor".into(),
            connector_id: "c".into(),
            stage: stage.into(),
            imported_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn each_predicate_filters() {
        let leads = vec![
            lead("A", "OH", "Lorain County", "44011", "1958-03-04", "READY"),
            lead("B", "PA", "Erie", "16501", "1990-01-01", "MAILED"),
            lead("C", "OH", "Cuyahoga", "44101-1234", "", "READY"),
        ];
        let names = |c: &LeadCriteria| -> Vec<String> {
            filter(&leads, c, today()).iter().map(|l| l.full_name.clone()).collect()
        };

        assert_eq!(names(&LeadCriteria::default()).len(), 3);
        assert_eq!(names(&LeadCriteria { stage: "MAILED".into(), ..Default::default() }), vec!["B"]);
        assert_eq!(names(&LeadCriteria { state: "oh".into(), ..Default::default() }), vec!["A", "C"]);
        assert_eq!(names(&LeadCriteria { county: "LORAIN".into(), ..Default::default() }), vec!["A"]);
        assert_eq!(names(&LeadCriteria { zip_prefix: "441".into(), ..Default::default() }), vec!["C"]);
        // C has no DOB and passes any age window
        assert_eq!(
            names(&LeadCriteria { min_age: Some(60), max_age: Some(70), ..Default::default() }),
            vec!["A", "C"]
        );
        assert_eq!(
            names(&LeadCriteria { max_age: Some(40), state: "PA".into(), ..Default::default() }),
            vec!["B"]
        );
    }

    #[test]
    fn paginate_bounds() {
        let items: Vec<u32> = (1..=7).collect();
        assert_eq!(paginate(&items, 3, 1), &[1, 2, 3]);
        assert_eq!(paginate(&items, 3, 3), &[7]);
        assert!(paginate(&items, 3, 4).is_empty());
        assert_eq!(paginate(&items, 0, 1), &[1]);
        assert_eq!(paginate(&items, 3, 0), &[1, 2, 3]);
        assert!(paginate(&items, usize::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn export_has_fixed_header_and_age() {
        let leads = vec![lead("Doe, Jane", "OH", "Lorain", "44011", "1958-03-04", "READY")];
        let text = export_csv(&leads, today()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Full Name,Street,Unit,City,State,ZIP,County,Phone,DOB,Age,Provider,Stage,Imported At"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("\"Doe, Jane\",1 Main,,Avon,OH,44011,Lorain,,1958-03-04,66,Vendor,READY,"));
    }
}
