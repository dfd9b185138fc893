use serde::Serialize;
use std::fmt;

use crate::docker::models::{ContainerSummary, short_id};

/// Opaque, deterministic slot binding a container to a place in the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlacementToken(u32);

impl PlacementToken {
    pub fn new(slot: u32) -> Self {
        Self(slot)
    }

    pub fn slot(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlacementToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry entry: a container bound to its placement.
///
/// Equality only looks at (name, ID, running). Two entries describing the
/// same container compare equal even when bound to different placements or
/// carrying different usage figures.
#[derive(Debug, Clone, Serialize)]
pub struct BoxContainer {
    pub placement: PlacementToken,
    pub id: String,
    pub name: String,
    /// Every name the daemon reports, primary first
    pub names: Vec<String>,
    pub image: String,
    pub running: bool,
    /// Daemon status line as of the last refresh
    pub status: String,
    /// Written by the stats poller only; NaN until sampled or when undefined
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl BoxContainer {
    pub fn new(placement: PlacementToken, summary: &ContainerSummary, running: bool) -> Self {
        Self {
            placement,
            id: summary.id.clone(),
            name: summary.primary_name().to_string(),
            names: summary.names.clone(),
            image: summary.image.clone(),
            running,
            status: summary.status.clone(),
            cpu_percent: f64::NAN,
            memory_percent: f64::NAN,
        }
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Overwrites the descriptive fields, keeping placement and usage.
    pub(super) fn update_from(&mut self, summary: &ContainerSummary, running: bool) {
        self.name = summary.primary_name().to_string();
        self.names = summary.names.clone();
        self.image = summary.image.clone();
        self.running = running;
        self.status = summary.status.clone();
    }
}

impl PartialEq for BoxContainer {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.id == other.id && self.running == other.running
    }
}

impl Eq for BoxContainer {}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, name: &str) -> ContainerSummary {
        ContainerSummary {
            id: id.to_string(),
            names: vec![name.to_string()],
            image: "nginx".to_string(),
            running: true,
            status: "Up".to_string(),
        }
    }

    #[test]
    fn test_equality_ignores_placement_and_usage() {
        let a = BoxContainer::new(PlacementToken::new(0), &summary("abc", "web"), true);
        let mut b = BoxContainer::new(PlacementToken::new(7), &summary("abc", "web"), true);
        b.cpu_percent = 12.5;
        b.image = "other".to_string();
        b.status = "Restarting".to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_tracks_state() {
        let a = BoxContainer::new(PlacementToken::new(0), &summary("abc", "web"), true);
        let b = BoxContainer::new(PlacementToken::new(0), &summary("abc", "web"), false);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fresh_entry_has_unknown_usage() {
        let summary = summary("abc123123456789", "web");
        let entry = BoxContainer::new(PlacementToken::new(3), &summary, true);
        assert!(entry.cpu_percent.is_nan());
        assert!(entry.memory_percent.is_nan());
        assert_eq!(entry.short_id(), "abc123123456");
        assert_eq!(entry.placement.to_string(), "#3");
    }
}
