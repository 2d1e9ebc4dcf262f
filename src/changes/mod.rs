pub mod differ;

pub use differ::{classify, ChangeKind, ChangeReport, ChangedFlight};
