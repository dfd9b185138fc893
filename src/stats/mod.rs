//! Container resource statistics: percentage math and streaming subscriptions.

pub mod poller;
pub mod usage;

pub use poller::{StatsPoller, Terminal};
pub use usage::{UsageSample, format_percent};
