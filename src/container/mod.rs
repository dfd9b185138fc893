//! Container registry: stable placements for the daemon's containers.

pub mod registry;
pub mod state;

pub use registry::{ContainerRegistry, RefreshSummary};
pub use state::BoxContainer;
