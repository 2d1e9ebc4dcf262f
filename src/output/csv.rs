use anyhow::Result;

use super::cell;
use crate::check::DirectionPreview;
use crate::flight::{Direction, FlightRecord};

pub fn snapshot_to_csv(direction: Direction, records: &[FlightRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "direction",
        "date",
        "flight_id",
        "airline",
        direction.location_field(),
        "scheduled_time",
        "actual_time",
        "terminal",
        "stand",
        "status",
    ])?;
    for record in records {
        writer.write_record([
            direction.as_slug().to_string(),
            record.retrieval_date.clone(),
            record.flight_id.clone(),
            cell(record.detail("airline")),
            cell(record.detail(direction.location_field())),
            cell(record.scheduled_time.as_ref()),
            cell(record.actual_time.as_ref()),
            cell(record.detail("terminal")),
            cell(record.detail("stand")),
            cell(record.detail("status")),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn changes_to_csv(previews: &[DirectionPreview]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "direction",
        "change",
        "date",
        "flight_id",
        "scheduled_time",
        "actual_time",
        "previous_scheduled",
        "previous_actual",
    ])?;
    for preview in previews {
        for flight in &preview.report.changed {
            writer.write_record([
                preview.direction.as_slug().to_string(),
                flight
                    .change
                    .map(|c| c.as_slug().to_string())
                    .unwrap_or_else(|| "baseline".to_string()),
                flight.record.retrieval_date.clone(),
                flight.record.flight_id.clone(),
                cell(flight.record.scheduled_time.as_ref()),
                cell(flight.record.actual_time.as_ref()),
                cell(flight.previous_scheduled.as_ref()),
                cell(flight.previous_actual.as_ref()),
            ])?;
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
