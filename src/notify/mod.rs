pub mod format;
pub mod sink;

use serde::Serialize;

use crate::changes::ChangedFlight;
use crate::flight::{Direction, Period};

pub use sink::{DiscordNotifier, MultiNotifier, Notifier, StdoutNotifier};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Only the flights that changed since the cached snapshot.
    Changes,
    /// No usable cache, so the whole snapshot stands in for the changes.
    Baseline,
    /// Scheduled full listing, independent of what changed.
    FullReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification<'a> {
    pub direction: Direction,
    pub airport: &'a str,
    pub period: &'a Period,
    pub kind: NotificationKind,
    pub summary: &'a str,
    pub flights: &'a [ChangedFlight],
}
