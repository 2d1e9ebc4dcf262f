use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::flight::normalize::normalize_ref;
use crate::flight::{FieldValue, FlightKey, FlightRecord};

pub const BASELINE_SUMMARY: &str = "first run, reporting all data";
pub const NO_CHANGES_SUMMARY: &str = "no changes";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    New,
    TimeChange,
}

impl ChangeKind {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::TimeChange => "time_change",
        }
    }
}

/// A current record selected for notification. `change` is `None` on a
/// baseline run, where every record is reported as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangedFlight {
    #[serde(flatten)]
    pub record: FlightRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<ChangeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_scheduled: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_actual: Option<FieldValue>,
}

impl ChangedFlight {
    fn baseline(record: &FlightRecord) -> Self {
        Self {
            record: record.clone(),
            change: None,
            previous_scheduled: None,
            previous_actual: None,
        }
    }

    fn new_flight(record: &FlightRecord) -> Self {
        Self {
            record: record.clone(),
            change: Some(ChangeKind::New),
            previous_scheduled: None,
            previous_actual: None,
        }
    }

    fn time_change(
        record: &FlightRecord,
        previous_scheduled: Option<FieldValue>,
        previous_actual: Option<FieldValue>,
    ) -> Self {
        Self {
            record: record.clone(),
            change: Some(ChangeKind::TimeChange),
            previous_scheduled,
            previous_actual,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeReport {
    pub has_changes: bool,
    pub summary: String,
    pub baseline: bool,
    pub changed: Vec<ChangedFlight>,
    /// Flight ids that disappeared since the previous run. Computed for
    /// logging only; removals are never notified.
    pub removed_ids: Vec<String>,
}

impl ChangeReport {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changed
            .iter()
            .filter(|c| c.change == Some(kind))
            .count()
    }
}

pub fn classify(previous: Option<&[FlightRecord]>, current: &[FlightRecord]) -> ChangeReport {
    let Some(previous) = previous else {
        return ChangeReport {
            has_changes: !current.is_empty(),
            summary: BASELINE_SUMMARY.to_string(),
            baseline: true,
            changed: current.iter().map(ChangedFlight::baseline).collect(),
            removed_ids: Vec::new(),
        };
    };

    let prev_ids = flight_ids(previous);
    let curr_ids = flight_ids(current);
    let prev_by_key = index_by_key(previous);
    let curr_by_key = index_by_key(current);

    let new_ids: BTreeSet<&str> = curr_ids.difference(&prev_ids).copied().collect();
    let removed_ids: Vec<String> = prev_ids
        .difference(&curr_ids)
        .map(|id| id.to_string())
        .collect();

    let mut changed: Vec<ChangedFlight> = current
        .iter()
        .filter(|record| new_ids.contains(record.flight_id.as_str()))
        .map(ChangedFlight::new_flight)
        .collect();
    let new_count = changed.len();

    for (key, curr) in &curr_by_key {
        let Some(prev) = prev_by_key.get(key) else {
            continue;
        };
        if new_ids.contains(key.flight_id.as_str()) {
            continue;
        }
        let prev_scheduled = normalize_ref(prev.scheduled_time.as_ref());
        let prev_actual = normalize_ref(prev.actual_time.as_ref());
        let curr_scheduled = normalize_ref(curr.scheduled_time.as_ref());
        let curr_actual = normalize_ref(curr.actual_time.as_ref());
        if prev_scheduled != curr_scheduled || prev_actual != curr_actual {
            changed.push(ChangedFlight::time_change(curr, prev_scheduled, prev_actual));
        }
    }
    let time_change_count = changed.len() - new_count;

    let mut tally = Vec::new();
    if new_count > 0 {
        tally.push(format!("{}: {new_count}件", ChangeKind::New.as_slug()));
    }
    if time_change_count > 0 {
        tally.push(format!(
            "{}: {time_change_count}件",
            ChangeKind::TimeChange.as_slug()
        ));
    }
    let has_changes = !tally.is_empty();
    let summary = if has_changes {
        tally.join(", ")
    } else {
        NO_CHANGES_SUMMARY.to_string()
    };

    ChangeReport {
        has_changes,
        summary,
        baseline: false,
        changed,
        removed_ids,
    }
}

fn flight_ids(records: &[FlightRecord]) -> BTreeSet<&str> {
    records.iter().map(|r| r.flight_id.as_str()).collect()
}

// Later records overwrite earlier ones sharing a key.
fn index_by_key(records: &[FlightRecord]) -> BTreeMap<FlightKey, &FlightRecord> {
    let mut map = BTreeMap::new();
    for record in records {
        map.insert(record.key(), record);
    }
    map
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn flight(id: &str, date: &str, scheduled: Option<&str>, actual: Option<&str>) -> FlightRecord {
        FlightRecord::new(id, date).with_times(scheduled, actual)
    }

    fn keys(report: &ChangeReport) -> BTreeSet<(String, String, Option<ChangeKind>)> {
        report
            .changed
            .iter()
            .map(|c| {
                (
                    c.record.flight_id.clone(),
                    c.record.retrieval_date.clone(),
                    c.change,
                )
            })
            .collect()
    }

    #[test]
    fn baseline_reports_every_current_record() {
        let current = vec![
            flight("KE123", "20251101", Some("1000"), None),
            flight("OZ456", "20251101", Some("1100"), None),
        ];
        let report = classify(None, &current);
        assert!(report.has_changes);
        assert!(report.baseline);
        assert_eq!(report.summary, BASELINE_SUMMARY);
        let records: Vec<FlightRecord> = report.changed.iter().map(|c| c.record.clone()).collect();
        assert_eq!(records, current);
        assert!(report.changed.iter().all(|c| c.change.is_none()));
    }

    #[test]
    fn baseline_with_empty_current_has_no_changes() {
        let report = classify(None, &[]);
        assert!(!report.has_changes);
        assert!(report.changed.is_empty());
    }

    #[test]
    fn only_unseen_flight_ids_are_new() {
        let previous = vec![flight("KE123", "20251101", Some("1000"), None)];
        let current = vec![
            flight("KE123", "20251108", Some("1000"), None),
            flight("OZ456", "20251101", Some("1200"), None),
        ];
        let report = classify(Some(previous.as_slice()), &current);
        assert!(report.has_changes);
        assert_eq!(
            keys(&report),
            BTreeSet::from([(
                "OZ456".to_string(),
                "20251101".to_string(),
                Some(ChangeKind::New)
            )])
        );
        assert_eq!(report.summary, "new: 1件");
    }

    #[test]
    fn new_id_on_several_dates_tags_each_record() {
        let previous = vec![flight("KE123", "20251101", Some("1000"), None)];
        let current = vec![
            flight("KE123", "20251101", Some("1000"), None),
            flight("CX900", "20251101", Some("0800"), None),
            flight("CX900", "20251102", Some("0800"), None),
        ];
        let report = classify(Some(previous.as_slice()), &current);
        assert_eq!(report.count(ChangeKind::New), 2);
        assert_eq!(report.count(ChangeKind::TimeChange), 0);
    }

    #[test]
    fn scheduled_change_carries_previous_values() {
        let previous = vec![flight("KE123", "20251101", Some("1000"), None)];
        let current = vec![flight("KE123", "20251101", Some("1015"), None)];
        let report = classify(Some(previous.as_slice()), &current);
        assert!(report.has_changes);
        assert_eq!(report.changed.len(), 1);
        let change = &report.changed[0];
        assert_eq!(change.change, Some(ChangeKind::TimeChange));
        assert_eq!(change.previous_scheduled, Some(FieldValue::text("1000")));
        assert_eq!(change.previous_actual, None);
        assert_eq!(report.summary, "time_change: 1件");
    }

    #[test]
    fn first_actual_time_counts_as_change() {
        let previous = vec![flight("KE123", "20251101", Some("1000"), None)];
        let current = vec![flight("KE123", "20251101", Some("1000"), Some("1005"))];
        let report = classify(Some(previous.as_slice()), &current);
        assert_eq!(report.count(ChangeKind::TimeChange), 1);
    }

    #[test]
    fn sentinel_spellings_do_not_count_as_change() {
        let mut previous = flight("KE123", "20251101", Some("1000"), None);
        previous.actual_time = Some(FieldValue::text("NaN"));
        let mut current = flight("KE123", "20251101", Some("1000"), None);
        current.actual_time = Some(FieldValue::Number(f64::NAN));
        let report = classify(Some(&[previous][..]), &[current]);
        assert!(!report.has_changes);
        assert_eq!(report.summary, NO_CHANGES_SUMMARY);
    }

    #[test]
    fn deletions_are_suppressed() {
        let previous = vec![
            flight("KE123", "20251101", Some("1000"), None),
            flight("KE999", "20251101", Some("1300"), None),
        ];
        let current = vec![flight("KE123", "20251101", Some("1000"), None)];
        let report = classify(Some(previous.as_slice()), &current);
        assert!(!report.has_changes);
        assert!(report.changed.is_empty());
        assert_eq!(report.removed_ids, vec!["KE999".to_string()]);
    }

    #[test]
    fn duplicate_keys_resolve_to_last_record() {
        let previous = vec![flight("KE123", "20251101", Some("1000"), None)];
        let current = vec![
            flight("KE123", "20251101", Some("1000"), None),
            flight("KE123", "20251101", Some("1400"), None),
        ];
        let report = classify(Some(previous.as_slice()), &current);
        assert_eq!(report.changed.len(), 1);
        assert_eq!(
            report.changed[0].record.scheduled_time,
            Some(FieldValue::text("1400"))
        );
    }

    #[test]
    fn mixed_changes_build_combined_summary() {
        let previous = vec![
            flight("KE123", "20251101", Some("1000"), None),
            flight("OZ456", "20251101", Some("1100"), None),
        ];
        let current = vec![
            flight("KE123", "20251101", Some("1000"), Some("1010")),
            flight("OZ456", "20251101", Some("1130"), None),
            flight("CX900", "20251101", Some("0800"), None),
        ];
        let report = classify(Some(previous.as_slice()), &current);
        assert_eq!(report.summary, "new: 1件, time_change: 2件");
    }

    #[test]
    fn classification_is_pure() {
        let previous = vec![
            flight("KE123", "20251101", Some("1000"), None),
            flight("OZ456", "20251102", Some("1100"), Some("1110")),
        ];
        let current = vec![
            flight("OZ456", "20251102", Some("1100"), Some("1125")),
            flight("CX900", "20251101", Some("0800"), None),
            flight("KE123", "20251101", Some("1000"), Some("1002")),
        ];
        let first = classify(Some(previous.as_slice()), &current);
        let second = classify(Some(previous.as_slice()), &current);
        assert_eq!(first, second);
    }

    #[test]
    fn identical_snapshots_report_nothing() {
        let snapshot = vec![
            flight("KE123", "20251101", Some("1000"), Some("1000")),
            flight("OZ456", "20251102", Some("1100"), None),
        ];
        let report = classify(Some(snapshot.as_slice()), &snapshot);
        assert!(!report.has_changes);
        assert!(report.changed.is_empty());
        assert!(report.removed_ids.is_empty());
    }
}
