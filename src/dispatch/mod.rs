//! Text command surface over the registry, image catalog and stats poller.

pub mod command;
pub mod dispatcher;
pub mod error;
pub mod render;

pub use dispatcher::{Dispatcher, Reply, WatchEvent};
