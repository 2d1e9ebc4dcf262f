use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::acquire::ScheduleSource;
use crate::changes::{classify, ChangeReport, ChangedFlight};
use crate::flight::{Direction, FlightRecord, Period};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::snapshot::store::SnapshotCache;

#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub airport: String,
    pub period: Period,
    pub directions: Vec<Direction>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    NotNeeded,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionOutcome {
    pub direction: Direction,
    pub fetched: usize,
    pub report: Option<ChangeReport>,
    pub delivery: Delivery,
    pub saved: bool,
}

impl DirectionOutcome {
    fn skipped(direction: Direction) -> Self {
        Self {
            direction,
            fetched: 0,
            report: None,
            delivery: Delivery::NotNeeded,
            saved: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Something needed delivering and no notification went out.
    DeliveryFailed,
    /// Every direction came back empty.
    NoData,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// A preview only fails when nothing was acquired.
    pub fn from_previews(previews: &[DirectionPreview]) -> Self {
        if previews.iter().all(|p| p.current.is_empty()) {
            Self::NoData
        } else {
            Self::Success
        }
    }

    fn from_outcomes(outcomes: &[DirectionOutcome]) -> Self {
        if outcomes.iter().all(|o| o.fetched == 0) {
            return Self::NoData;
        }
        let delivered = outcomes.iter().any(|o| o.delivery == Delivery::Delivered);
        let failed = outcomes.iter().any(|o| o.delivery == Delivery::Failed);
        if delivered || !failed {
            Self::Success
        } else {
            Self::DeliveryFailed
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub directions: Vec<DirectionOutcome>,
}

/// Classification of one direction without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct DirectionPreview {
    pub direction: Direction,
    pub current: Vec<FlightRecord>,
    pub report: ChangeReport,
}

/// Hourly change check: fetch, compare with the cached snapshot, notify
/// what changed and refresh the cache.
pub struct CheckRunner {
    settings: CheckSettings,
    source: Arc<dyn ScheduleSource>,
    notifier: Arc<dyn Notifier>,
    cache: SnapshotCache,
}

impl CheckRunner {
    pub fn new(
        settings: CheckSettings,
        source: Arc<dyn ScheduleSource>,
        notifier: Arc<dyn Notifier>,
        cache: SnapshotCache,
    ) -> Self {
        Self {
            settings,
            source,
            notifier,
            cache,
        }
    }

    pub fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    pub async fn run(&self) -> RunOutcome {
        info!(
            "checking {} for {} ({})",
            self.source.name(),
            self.settings.airport,
            self.settings.period
        );
        let mut outcomes = Vec::with_capacity(self.settings.directions.len());
        for direction in &self.settings.directions {
            outcomes.push(self.check_direction(*direction).await);
        }
        let status = RunStatus::from_outcomes(&outcomes);
        match status {
            RunStatus::Success => info!("check finished"),
            RunStatus::DeliveryFailed => warn!("check finished but no notification was delivered"),
            RunStatus::NoData => warn!("no schedule data for any direction"),
        }
        RunOutcome {
            status,
            directions: outcomes,
        }
    }

    async fn check_direction(&self, direction: Direction) -> DirectionOutcome {
        let current = acquire(self.source.as_ref(), &self.settings, direction).await;
        if current.is_empty() {
            info!("{}: no data, skipping", direction.as_slug());
            return DirectionOutcome::skipped(direction);
        }

        let previous = self.cache.load_or_baseline(direction);
        let report = classify(previous.as_deref(), &current);
        if !report.removed_ids.is_empty() {
            info!(
                "{}: {} flights no longer listed (not notified)",
                direction.as_slug(),
                report.removed_ids.len()
            );
        }

        info!("{}: {}", direction.as_slug(), report.summary);
        let delivery = if report.has_changes && !report.changed.is_empty() {
            let kind = if report.baseline {
                NotificationKind::Baseline
            } else {
                NotificationKind::Changes
            };
            deliver(
                self.notifier.as_ref(),
                &self.settings,
                direction,
                kind,
                &report.summary,
                &report.changed,
            )
            .await
        } else {
            Delivery::NotNeeded
        };

        // A failed delivery keeps the old snapshot so the same changes are
        // detected again next run.
        let saved = if delivery == Delivery::Failed {
            warn!("{}: keeping previous cache", direction.as_slug());
            false
        } else {
            save(&self.cache, direction, &current)
        };

        DirectionOutcome {
            direction,
            fetched: current.len(),
            report: Some(report),
            delivery,
            saved,
        }
    }
}

/// Daily listing of the whole schedule, regardless of changes.
pub struct ReportRunner {
    settings: CheckSettings,
    source: Arc<dyn ScheduleSource>,
    notifier: Arc<dyn Notifier>,
    cache: SnapshotCache,
}

impl ReportRunner {
    pub fn new(
        settings: CheckSettings,
        source: Arc<dyn ScheduleSource>,
        notifier: Arc<dyn Notifier>,
        cache: SnapshotCache,
    ) -> Self {
        Self {
            settings,
            source,
            notifier,
            cache,
        }
    }

    pub async fn run(&self) -> RunOutcome {
        let mut outcomes = Vec::with_capacity(self.settings.directions.len());
        for direction in &self.settings.directions {
            let direction = *direction;
            let current = acquire(self.source.as_ref(), &self.settings, direction).await;
            if current.is_empty() {
                info!("{}: no data for report", direction.as_slug());
                outcomes.push(DirectionOutcome::skipped(direction));
                continue;
            }
            let report = classify(None, &current);
            let summary = format!("{}件", current.len());
            let delivery = deliver(
                self.notifier.as_ref(),
                &self.settings,
                direction,
                NotificationKind::FullReport,
                &summary,
                &report.changed,
            )
            .await;
            let saved = delivery == Delivery::Delivered && save(&self.cache, direction, &current);
            outcomes.push(DirectionOutcome {
                direction,
                fetched: current.len(),
                report: None,
                delivery,
                saved,
            });
        }
        let status = RunStatus::from_outcomes(&outcomes);
        RunOutcome {
            status,
            directions: outcomes,
        }
    }
}

pub async fn acquire(
    source: &dyn ScheduleSource,
    settings: &CheckSettings,
    direction: Direction,
) -> Vec<FlightRecord> {
    match source
        .fetch(direction, &settings.period, &settings.airport)
        .await
    {
        Ok(records) => records,
        Err(err) => {
            warn!(
                "{} {} acquisition failed: {err:#}",
                source.name(),
                direction.as_slug()
            );
            Vec::new()
        }
    }
}

/// Classifies every configured direction against the cache without
/// notifying or writing.
pub async fn preview(
    source: &dyn ScheduleSource,
    settings: &CheckSettings,
    cache: &SnapshotCache,
) -> Vec<DirectionPreview> {
    let mut out = Vec::new();
    for direction in &settings.directions {
        let current = acquire(source, settings, *direction).await;
        let previous = cache.load_or_baseline(*direction);
        let report = classify(previous.as_deref(), &current);
        out.push(DirectionPreview {
            direction: *direction,
            current,
            report,
        });
    }
    out
}

async fn deliver(
    notifier: &dyn Notifier,
    settings: &CheckSettings,
    direction: Direction,
    kind: NotificationKind,
    summary: &str,
    flights: &[ChangedFlight],
) -> Delivery {
    let notification = Notification {
        direction,
        airport: &settings.airport,
        period: &settings.period,
        kind,
        summary,
        flights,
    };
    match notifier.notify(&notification).await {
        Ok(()) => Delivery::Delivered,
        Err(err) => {
            warn!(
                "{} notification via {} failed: {err:#}",
                direction.as_slug(),
                notifier.name()
            );
            Delivery::Failed
        }
    }
}

fn save(cache: &SnapshotCache, direction: Direction, current: &[FlightRecord]) -> bool {
    match cache.save(direction, current) {
        Ok(()) => true,
        Err(err) => {
            warn!("{}: cache write failed: {err}", direction.as_slug());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(fetched: usize, delivery: Delivery) -> DirectionOutcome {
        DirectionOutcome {
            direction: Direction::Departure,
            fetched,
            report: None,
            delivery,
            saved: false,
        }
    }

    #[test]
    fn all_empty_directions_mean_no_data() {
        let outcomes = vec![outcome(0, Delivery::NotNeeded), outcome(0, Delivery::NotNeeded)];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::NoData);
        assert_eq!(RunStatus::from_outcomes(&[]), RunStatus::NoData);
        assert_eq!(RunStatus::NoData.exit_code(), 1);
    }

    #[test]
    fn quiet_run_is_success() {
        let outcomes = vec![outcome(3, Delivery::NotNeeded), outcome(0, Delivery::NotNeeded)];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::Success);
        assert_eq!(RunStatus::Success.exit_code(), 0);
    }

    #[test]
    fn one_delivery_is_enough() {
        let outcomes = vec![outcome(3, Delivery::Failed), outcome(2, Delivery::Delivered)];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::Success);
    }

    #[test]
    fn only_failed_deliveries_fail_the_run() {
        let outcomes = vec![outcome(3, Delivery::Failed), outcome(2, Delivery::NotNeeded)];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::DeliveryFailed);
        assert_eq!(RunStatus::DeliveryFailed.exit_code(), 1);
    }
}
