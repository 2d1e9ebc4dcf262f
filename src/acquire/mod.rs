pub mod html;
pub mod http;
pub mod incheon;

use anyhow::Result;
use async_trait::async_trait;

use crate::flight::{Direction, FlightRecord, Period};

pub use incheon::IncheonCargoSource;

/// Produces flat flight records for one direction. An empty result means no
/// data; an error means the transport failed and is treated as empty by the
/// caller.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(
        &self,
        direction: Direction,
        period: &Period,
        airport: &str,
    ) -> Result<Vec<FlightRecord>>;
}
