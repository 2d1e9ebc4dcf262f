use crate::flight::{FieldValue, FlightRecord};

/// Collapses every "no value" spelling the page or a cache round-trip can
/// produce into `None`: missing, empty text, the text `NaN`, and NaN numbers.
pub fn normalize_value(value: Option<FieldValue>) -> Option<FieldValue> {
    match value {
        None => None,
        Some(FieldValue::Text(s)) if s.is_empty() || s == "NaN" => None,
        Some(FieldValue::Number(n)) if n.is_nan() => None,
        other => other,
    }
}

pub fn normalize_ref(value: Option<&FieldValue>) -> Option<FieldValue> {
    normalize_value(value.cloned())
}

pub fn normalize_record(record: &FlightRecord) -> FlightRecord {
    FlightRecord {
        flight_id: record.flight_id.clone(),
        retrieval_date: record.retrieval_date.clone(),
        scheduled_time: normalize_ref(record.scheduled_time.as_ref()),
        actual_time: normalize_ref(record.actual_time.as_ref()),
        details: record
            .details
            .iter()
            .map(|(key, value)| (key.clone(), normalize_ref(value.as_ref())))
            .collect(),
    }
}
