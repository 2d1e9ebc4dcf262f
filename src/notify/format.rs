use std::collections::BTreeMap;

use crate::changes::{ChangeKind, ChangedFlight};
use crate::flight::normalize::normalize_ref;
use crate::flight::{Direction, FieldValue};
use crate::notify::{Notification, NotificationKind};

pub const MAX_DESCRIPTION_CHARS: usize = 1900;
const TRUNCATION_MARKER: &str = "\n...(省略)";
const UNKNOWN_TIME: &str = "未定";

pub fn render_title(n: &Notification<'_>) -> String {
    let suffix = match n.kind {
        NotificationKind::Changes => " 変更通知",
        NotificationKind::Baseline | NotificationKind::FullReport => "",
    };
    format!(
        "{} 仁川国際空港 貨物{}スケジュール{suffix}",
        n.direction.emoji(),
        n.direction.label()
    )
}

pub fn render_description(n: &Notification<'_>) -> String {
    let mut out = format!(
        "**期間**: {}\n**空港**: {}\n**件数**: {}件\n",
        n.period,
        n.airport,
        n.flights.len()
    );
    if n.kind == NotificationKind::Changes {
        out.push_str(&format!("**変更内容**: {}\n", n.summary));
    }
    out.push('\n');

    let mut by_date: BTreeMap<&str, Vec<&ChangedFlight>> = BTreeMap::new();
    for flight in n.flights {
        by_date
            .entry(flight.record.retrieval_date.as_str())
            .or_default()
            .push(flight);
    }
    for (date, flights) in by_date {
        out.push_str(&format!("**📅 {}**\n", format_date(date)));
        for flight in flights {
            out.push_str(&render_flight(n, flight));
            out.push('\n');
        }
    }
    truncate(&out, MAX_DESCRIPTION_CHARS)
}

fn render_flight(n: &Notification<'_>, flight: &ChangedFlight) -> String {
    let record = &flight.record;
    let label = n.direction.label();
    let mut out = String::new();

    let marker = match flight.change {
        Some(ChangeKind::New) => "🆕 ",
        Some(ChangeKind::TimeChange) => "⏰ ",
        None => "",
    };
    let airline = record
        .detail("airline")
        .map(ToString::to_string)
        .unwrap_or_else(|| "N/A".to_string());
    out.push_str(&format!("{marker}✈️ **{}** ({airline})\n", record.flight_id));

    if let Some(location) = record.detail(n.direction.location_field()) {
        let location_label = match n.direction {
            Direction::Departure => "目的地",
            Direction::Arrival => "出発地",
        };
        out.push_str(&format!("  📍 {location_label}: {location}\n"));
    }

    let scheduled = display_time(record.scheduled_time.as_ref());
    out.push_str(&format!("  🕐 予定{label}時間: {scheduled}\n"));
    if let Some(actual) = normalize_ref(record.actual_time.as_ref()) {
        if Some(&actual) != normalize_ref(record.scheduled_time.as_ref()).as_ref() {
            out.push_str(&format!("  🕐 実{label}時間: **{actual}**\n"));
        }
    }
    if flight.change == Some(ChangeKind::TimeChange) {
        out.push_str(&format!(
            "  ↩️ 変更前: 予定 {} / 実 {}\n",
            display_time(flight.previous_scheduled.as_ref()),
            display_time(flight.previous_actual.as_ref())
        ));
    }

    if let Some(stand) = record.detail("stand") {
        out.push_str(&format!("  🚪 駐機場: {stand}\n"));
    }
    if let Some(terminal) = record.detail("terminal") {
        out.push_str(&format!("  🏢 ターミナル: {terminal}\n"));
    }
    if let Some(status) = record.detail("status") {
        let icon = if status.to_string().contains(label) {
            "✅"
        } else {
            "⏳"
        };
        out.push_str(&format!("  {icon} 状態: {status}\n"));
    }
    out
}

fn display_time(value: Option<&FieldValue>) -> String {
    normalize_ref(value)
        .map(|v| v.to_string())
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

/// `20251101` -> `2025/11/01`; anything else is returned unchanged.
pub fn format_date(date: &str) -> String {
    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        format!("{}/{}/{}", &date[..4], &date[4..6], &date[6..])
    } else {
        date.to_string()
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
