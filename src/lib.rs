pub mod acquire;
pub mod changes;
pub mod check;
pub mod config;
pub mod error;
pub mod flight;
pub mod notify;
pub mod output;
pub mod snapshot;
