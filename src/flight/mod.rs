pub mod normalize;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use normalize::{normalize_record, normalize_value};

pub const DATE_FORMAT: &str = "%Y%m%d";
pub const MAX_PERIOD_DAYS: u32 = 366;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Departure,
    Arrival,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Departure, Direction::Arrival];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Departure => "departure",
            Self::Arrival => "arrival",
        }
    }

    /// Label used in notification text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Departure => "出発",
            Self::Arrival => "到着",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Departure => "🛫",
            Self::Arrival => "🛬",
        }
    }

    /// Name of the counterpart airport field: destination for departures,
    /// origin for arrivals.
    pub fn location_field(&self) -> &'static str {
        match self {
            Self::Departure => "destination",
            Self::Arrival => "origin",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Departure => "Departure",
            Self::Arrival => "Arrival",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown direction: {0}")]
pub struct DirectionParseError(pub String);

impl FromStr for Direction {
    type Err = DirectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "departure" | "departures" | "dep" => Ok(Self::Departure),
            "arrival" | "arrivals" | "arr" => Ok(Self::Arrival),
            _ => Err(DirectionParseError(s.to_string())),
        }
    }
}

/// A scalar scraped from the schedule page. Untagged so the cache file holds
/// plain JSON strings and numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// One flight occurrence on one retrieval date, in direction-neutral form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightRecord {
    pub flight_id: String,
    pub retrieval_date: String,
    #[serde(default)]
    pub scheduled_time: Option<FieldValue>,
    #[serde(default)]
    pub actual_time: Option<FieldValue>,
    #[serde(default, flatten)]
    pub details: BTreeMap<String, Option<FieldValue>>,
}

impl FlightRecord {
    pub fn new(flight_id: impl Into<String>, retrieval_date: impl Into<String>) -> Self {
        Self {
            flight_id: flight_id.into(),
            retrieval_date: retrieval_date.into(),
            scheduled_time: None,
            actual_time: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_times(mut self, scheduled: Option<&str>, actual: Option<&str>) -> Self {
        self.scheduled_time = scheduled.map(FieldValue::text);
        self.actual_time = actual.map(FieldValue::text);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details
            .insert(key.into(), Some(FieldValue::Text(value.into())));
        self
    }

    pub fn key(&self) -> FlightKey {
        FlightKey {
            flight_id: self.flight_id.clone(),
            retrieval_date: self.retrieval_date.clone(),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&FieldValue> {
        self.details.get(key).and_then(Option::as_ref)
    }
}

/// Correlates a record across two snapshots. Not unique within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    pub flight_id: String,
    pub retrieval_date: String,
}

pub type Snapshot = Vec<FlightRecord>;

/// Inclusive range of schedule dates fetched in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// `days` consecutive dates starting at `start`, clamped to
    /// `1..=MAX_PERIOD_DAYS` and to the last representable date.
    pub fn starting(start: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.clamp(1, MAX_PERIOD_DAYS) - 1);
        let end = start
            .checked_add_signed(Duration::days(span))
            .unwrap_or(NaiveDate::MAX);
        Self { start, end }
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut day = Some(self.start);
        while let Some(current) = day.filter(|d| *d <= self.end) {
            out.push(current);
            day = current.succ_opt();
        }
        out
    }

    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ~ {}", self.start_str(), self.end_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direction_aliases() {
        assert_eq!("dep".parse::<Direction>().unwrap(), Direction::Departure);
        assert_eq!(" Arrival ".parse::<Direction>().unwrap(), Direction::Arrival);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn period_spans_requested_days() {
        let start = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        let period = Period::starting(start, 7);
        let days = period.days();
        assert_eq!(days.len(), 7);
        assert_eq!(period.to_string(), "20251101 ~ 20251107");
        assert_eq!(Period::starting(start, 0).days().len(), 1);
    }

    #[test]
    fn oversized_period_is_clamped() {
        let start = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        let period = Period::starting(start, u32::MAX);
        assert_eq!(period.days().len(), MAX_PERIOD_DAYS as usize);

        let near_end = NaiveDate::MAX - Duration::days(3);
        let period = Period::starting(near_end, 30);
        assert_eq!(period.end, NaiveDate::MAX);
        assert_eq!(period.days().len(), 4);
    }

    #[test]
    fn record_round_trips_through_cache_json() {
        let record = FlightRecord::new("KE123", "20251101")
            .with_times(Some("10:00"), None)
            .with_detail("airline", "Korean Air");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["flight_id"], "KE123");
        assert!(json["actual_time"].is_null());
        assert_eq!(json["airline"], "Korean Air");

        let back: FlightRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
