use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use super::cell;
use crate::changes::ChangeKind;
use crate::check::{Delivery, DirectionPreview, RunOutcome};
use crate::flight::{Direction, FlightRecord};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_snapshot_table(direction: Direction, records: &[FlightRecord]) -> String {
    let mut table = new_table();
    let location = match direction {
        Direction::Departure => "Destination",
        Direction::Arrival => "Origin",
    };
    table.set_header(vec![
        "Date",
        "Flight",
        "Airline",
        location,
        "Scheduled",
        "Actual",
        "Terminal",
        "Stand",
        "Status",
    ]);
    for record in records {
        table.add_row(vec![
            record.retrieval_date.clone(),
            record.flight_id.clone(),
            cell(record.detail("airline")),
            cell(record.detail(direction.location_field())),
            cell(record.scheduled_time.as_ref()),
            cell(record.actual_time.as_ref()),
            cell(record.detail("terminal")),
            cell(record.detail("stand")),
            cell(record.detail("status")),
        ]);
    }
    format!(
        "{} {} ({} flights)\n{table}",
        direction.emoji(),
        direction.as_slug(),
        records.len()
    )
}

pub fn render_changes_table(previews: &[DirectionPreview]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Direction",
        "Change",
        "Date",
        "Flight",
        "Scheduled",
        "Actual",
        "Before",
    ]);
    for preview in previews {
        for flight in &preview.report.changed {
            let change_cell = match flight.change {
                Some(ChangeKind::New) => Cell::new("NEW").fg(Color::Green),
                Some(ChangeKind::TimeChange) => Cell::new("TIME").fg(Color::Yellow),
                None => Cell::new("BASELINE"),
            };
            let before = if flight.change == Some(ChangeKind::TimeChange) {
                format!(
                    "{} / {}",
                    or_dash(cell(flight.previous_scheduled.as_ref())),
                    or_dash(cell(flight.previous_actual.as_ref()))
                )
            } else {
                "-".to_string()
            };
            table.add_row(Row::from(vec![
                Cell::new(preview.direction.as_slug()),
                change_cell,
                Cell::new(&flight.record.retrieval_date),
                Cell::new(&flight.record.flight_id),
                Cell::new(or_dash(cell(flight.record.scheduled_time.as_ref()))),
                Cell::new(or_dash(cell(flight.record.actual_time.as_ref()))),
                Cell::new(before),
            ]));
        }
    }

    let mut out = table.to_string();
    for preview in previews {
        out.push_str(&format!(
            "\n{}: {}",
            preview.direction.as_slug(),
            preview.report.summary
        ));
    }
    out
}

pub fn render_outcome_table(outcome: &RunOutcome) -> String {
    let mut table = new_table();
    table.set_header(vec!["Direction", "Fetched", "Summary", "Delivery", "Cache"]);
    for item in &outcome.directions {
        let summary = item
            .report
            .as_ref()
            .map(|r| r.summary.clone())
            .unwrap_or_else(|| "-".to_string());
        let delivery_cell = match item.delivery {
            Delivery::Delivered => Cell::new("sent").fg(Color::Green),
            Delivery::Failed => Cell::new("failed").fg(Color::Red),
            Delivery::NotNeeded => Cell::new("-"),
        };
        table.add_row(Row::from(vec![
            Cell::new(item.direction.as_slug()),
            Cell::new(item.fetched),
            Cell::new(summary),
            delivery_cell,
            Cell::new(if item.saved { "saved" } else { "kept" }),
        ]));
    }
    format!("{table}\nstatus: {:?}", outcome.status)
}

fn or_dash(value: String) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value
    }
}
