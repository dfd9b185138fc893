//! Typed access to a Docker daemon.

pub mod client;
pub mod error;
pub mod models;

#[allow(unused)]
pub use client::StatsStream;
pub use client::{BollardClient, DockerApi};
pub use error::DockerError;
pub use models::{ContainerSummary, Image, StatSample};
