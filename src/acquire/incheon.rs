use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::acquire::html::{contains_ci, elements, first, text};
use crate::acquire::http::{build_client, fetch_text};
use crate::acquire::ScheduleSource;
use crate::flight::{Direction, FieldValue, FlightRecord, Period, DATE_FORMAT};

const DEPARTURE_API: &str = "https://www.airport.kr/depCargo/ap_ja/depCargoSchList.do";
const ARRIVAL_API: &str = "https://www.airport.kr/arrCargo/ap_ja/arrCargoSchList.do";
const DEPARTURE_PAGE: &str = "https://www.airport.kr/ap_ja/1787/subview.do";
const ARRIVAL_PAGE: &str = "https://www.airport.kr/ap_ja/1790/subview.do";
const REFERER: &str = "https://www.airport.kr/";
const NO_DATA_MARKERS: [&str; 2] = ["照会されたデータがありません", "there is no registered data"];

/// Cargo schedule pages of Incheon International Airport, fetched one day at
/// a time with a fixed pause between requests.
pub struct IncheonCargoSource {
    client: Client,
    request_delay: Duration,
}

impl IncheonCargoSource {
    pub fn new(timeout: Duration, request_delay: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout, REFERER)?,
            request_delay,
        })
    }

    async fn fetch_day(
        &self,
        direction: Direction,
        date: NaiveDate,
        airport: &str,
    ) -> Result<Vec<FlightRecord>> {
        let (api, page) = endpoints(direction);
        let params = build_params(date, airport, Local::now().naive_local());
        let mut body = fetch_text(&self.client, api, &params).await?;
        if is_no_data(&body) {
            debug!("{api} reported no data for {date}, trying schedule page");
            body = fetch_text(&self.client, page, &params).await?;
        }
        let retrieval_date = date.format(DATE_FORMAT).to_string();
        Ok(parse_schedule(&body, direction, &retrieval_date))
    }
}

#[async_trait]
impl ScheduleSource for IncheonCargoSource {
    fn name(&self) -> &str {
        "incheon-cargo"
    }

    async fn fetch(
        &self,
        direction: Direction,
        period: &Period,
        airport: &str,
    ) -> Result<Vec<FlightRecord>> {
        let days = period.days();
        let mut all = Vec::new();
        for (i, date) in days.iter().enumerate() {
            match self.fetch_day(direction, *date, airport).await {
                Ok(records) => {
                    info!(
                        "{} {} {}: {} flights",
                        direction.as_slug(),
                        airport,
                        date.format(DATE_FORMAT),
                        records.len()
                    );
                    all.extend(records);
                }
                Err(err) => warn!(
                    "{} fetch failed for {}: {err:#}",
                    direction.as_slug(),
                    date.format(DATE_FORMAT)
                ),
            }
            if i + 1 < days.len() {
                tokio::time::sleep(self.request_delay).await;
            }
        }
        Ok(all)
    }
}

fn endpoints(direction: Direction) -> (&'static str, &'static str) {
    match direction {
        Direction::Departure => (DEPARTURE_API, DEPARTURE_PAGE),
        Direction::Arrival => (ARRIVAL_API, ARRIVAL_PAGE),
    }
}

pub fn build_params(date: NaiveDate, airport: &str, now: NaiveDateTime) -> Vec<(&'static str, String)> {
    let day = date.format(DATE_FORMAT).to_string();
    let tomorrow = date
        .succ_opt()
        .unwrap_or(date)
        .format(DATE_FORMAT)
        .to_string();
    let start_time = "0000".to_string();
    let end_time = "2359".to_string();
    vec![
        ("curDate", day.clone()),
        ("startTime", start_time.clone()),
        ("airPort", airport.to_string()),
        ("endTime", end_time.clone()),
        ("todayDate", day.clone()),
        ("tomorrowDate", tomorrow),
        ("todayTime", now.format("%H%M").to_string()),
        ("curStime", start_time.clone()),
        ("curEtime", end_time.clone()),
        ("siteId", "ap_ja".to_string()),
        ("langSe", "ja".to_string()),
        ("scheduleListLength", "2".to_string()),
        ("termId", String::new()),
        ("daySel", day),
        ("fromTime", start_time),
        ("toTime", end_time),
        ("airport", airport.to_string()),
        ("airline", String::new()),
        ("airplane", String::new()),
    ]
}

pub fn is_no_data(body: &str) -> bool {
    NO_DATA_MARKERS.iter().any(|marker| contains_ci(body, marker))
}

/// Extracts flights from `div.data > div.body > div.group > div.toggle` rows.
/// Rows without a flight number are dropped since they cannot be correlated.
pub fn parse_schedule(html: &str, direction: Direction, retrieval_date: &str) -> Vec<FlightRecord> {
    let Some(data) = first(html, "div", Some("data")) else {
        debug!("no schedule container in page");
        return Vec::new();
    };
    let Some(body) = first(data, "div", Some("body")) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for group in elements(body, "div", Some("group")) {
        let Some(row) = first(group, "div", Some("toggle")) else {
            continue;
        };
        match parse_row(row, direction, retrieval_date) {
            Some(record) => out.push(record),
            None => debug!("skipping schedule row without flight number"),
        }
    }
    out
}

fn parse_row(row: &str, direction: Direction, retrieval_date: &str) -> Option<FlightRecord> {
    let mut flight_id = None;
    let mut record = FlightRecord::new("", retrieval_date);

    if let Some(col) = first(row, "div", Some("col1")) {
        record.scheduled_time = first(col, "strong", None).map(|e| FieldValue::Text(text(e)));
        record.actual_time = first(col, "span", None).map(|e| FieldValue::Text(text(e)));
    }
    if let Some(location) =
        first(row, "div", Some("col2")).and_then(|col| first(col, "div", Some("location")))
    {
        insert_detail(&mut record, direction.location_field(), text(location));
    }
    if let Some(airplane) =
        first(row, "div", Some("col3")).and_then(|col| first(col, "div", Some("airplane")))
    {
        let names = elements(airplane, "span", Some("name"));
        match names.as_slice() {
            [number, airline, ..] => {
                flight_id = first(number, "strong", None).map(text);
                insert_detail(&mut record, "airline", text(airline));
            }
            [single] => {
                let value = text(single);
                if value.chars().any(|c| c.is_ascii_digit()) {
                    flight_id = Some(value);
                } else {
                    insert_detail(&mut record, "airline", value);
                }
            }
            [] => {}
        }
    }
    for (class, key) in [("col4", "terminal"), ("col5", "stand"), ("col6", "status")] {
        if let Some(col) = first(row, "div", Some(class)) {
            insert_detail(&mut record, key, text(col));
        }
    }

    record.flight_id = flight_id.filter(|id| !id.is_empty())?;
    Some(record)
}

fn insert_detail(record: &mut FlightRecord, key: &str, value: String) {
    if !value.is_empty() {
        record
            .details
            .insert(key.to_string(), Some(FieldValue::Text(value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<div class="data">
  <div class="header"><div class="col">予定</div></div>
  <div class="body">
    <div class="group">
      <div class="row toggle">
        <div class="col1"><strong>09:40</strong><span>10:05</span></div>
        <div class="col2"><div class="location"><i class="hidden-text">目的地</i>NAGOYA(NGO)</div></div>
        <div class="col3"><div class="airplane">
          <span class="name"><strong>KE0741</strong></span><span class="name">大韓航空</span>
        </div></div>
        <div class="col4"><i class="hidden-text">ターミナル</i>T2</div>
        <div class="col5"><i class="hidden-text">駐機場</i>611</div>
        <div class="col6"><i class="hidden-text">状態</i>出発</div>
      </div>
      <div class="row detail"><div class="inner">extra</div></div>
    </div>
    <div class="group">
      <div class="row toggle">
        <div class="col1"><strong>13:00</strong><span></span></div>
        <div class="col3"><div class="airplane"><span class="name">OZ0124</span></div></div>
      </div>
    </div>
    <div class="group">
      <div class="row toggle">
        <div class="col3"><div class="airplane"><span class="name">Cargo Air</span></div></div>
      </div>
    </div>
  </div>
</div>
</body></html>"#;

    #[test]
    fn parses_rows_into_direction_neutral_records() {
        let records = parse_schedule(PAGE, Direction::Departure, "20251101");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.flight_id, "KE0741");
        assert_eq!(first.retrieval_date, "20251101");
        assert_eq!(first.scheduled_time, Some(FieldValue::text("09:40")));
        assert_eq!(first.actual_time, Some(FieldValue::text("10:05")));
        assert_eq!(first.detail("destination"), Some(&FieldValue::text("NAGOYA(NGO)")));
        assert_eq!(first.detail("airline"), Some(&FieldValue::text("大韓航空")));
        assert_eq!(first.detail("terminal"), Some(&FieldValue::text("T2")));
        assert_eq!(first.detail("stand"), Some(&FieldValue::text("611")));
        assert_eq!(first.detail("status"), Some(&FieldValue::text("出発")));

        let second = &records[1];
        assert_eq!(second.flight_id, "OZ0124");
        assert_eq!(second.actual_time, Some(FieldValue::text("")));
    }

    #[test]
    fn arrival_rows_use_origin_field() {
        let records = parse_schedule(PAGE, Direction::Arrival, "20251101");
        assert!(records[0].detail("origin").is_some());
        assert!(records[0].detail("destination").is_none());
    }

    #[test]
    fn page_without_container_yields_nothing() {
        assert!(parse_schedule("<html></html>", Direction::Departure, "20251101").is_empty());
    }

    #[test]
    fn detects_no_data_marker() {
        assert!(is_no_data("<p>照会されたデータがありません</p>"));
        assert!(is_no_data("There is NO registered data"));
        assert!(!is_no_data(PAGE));
    }

    #[test]
    fn params_cover_requested_day() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let now = date.and_hms_opt(8, 5, 0).unwrap();
        let params = build_params(date, "NGO", now);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("curDate"), "20251231");
        assert_eq!(get("tomorrowDate"), "20260101");
        assert_eq!(get("todayTime"), "0805");
        assert_eq!(get("airPort"), "NGO");
    }
}
