//! Container registry
//!
//! Binds every container the daemon reports to a `BoxContainer` with a stable
//! placement token. `refresh` reconciles against the daemon by container ID
//! and swaps the new entry set in as a unit, so readers always see a whole
//! snapshot. Refreshes are serialized end to end: a slow refresh can never
//! swap in a listing older than one already applied.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::state::{BoxContainer, PlacementToken};
use crate::docker::{ContainerSummary, DockerApi, DockerError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub added: usize,
    pub removed: usize,
    pub retained: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<String, BoxContainer>,
    /// Container IDs in daemon order
    order: Vec<String>,
    /// Primary names from the last running-only query
    running_names: HashSet<String>,
}

/// Hands out the lowest slot not already taken.
struct SlotAllocator {
    used: BTreeSet<u32>,
    cursor: u32,
}

impl SlotAllocator {
    fn new(used: BTreeSet<u32>) -> Self {
        Self { used, cursor: 0 }
    }

    fn allocate(&mut self) -> PlacementToken {
        while self.used.contains(&self.cursor) {
            self.cursor += 1;
        }
        self.used.insert(self.cursor);
        PlacementToken::new(self.cursor)
    }
}

impl RegistryState {
    fn reconcile(
        &self,
        all: &[ContainerSummary],
        running: &[ContainerSummary],
    ) -> (RegistryState, RefreshSummary) {
        let running_ids: HashSet<&str> = running.iter().map(|c| c.id.as_str()).collect();
        let running_names = running
            .iter()
            .map(|c| c.primary_name().to_string())
            .collect();

        // A container started between the two queries only shows up in `running`.
        let mut seen = HashSet::new();
        let mut listed: Vec<&ContainerSummary> = Vec::with_capacity(all.len());
        for container in all.iter().chain(running.iter()) {
            if !container.id.is_empty() && seen.insert(container.id.as_str()) {
                listed.push(container);
            }
        }

        let retained_slots = listed
            .iter()
            .filter_map(|c| self.entries.get(&c.id))
            .map(|entry| entry.placement.slot())
            .collect();
        let mut slots = SlotAllocator::new(retained_slots);

        let mut summary = RefreshSummary::default();
        let mut entries = HashMap::with_capacity(listed.len());
        let mut order = Vec::with_capacity(listed.len());

        for container in listed {
            let is_running = running_ids.contains(container.id.as_str());
            let entry = match self.entries.get(&container.id) {
                Some(existing) => {
                    let mut entry = existing.clone();
                    entry.update_from(container, is_running);
                    summary.retained += 1;
                    entry
                }
                None => {
                    summary.added += 1;
                    BoxContainer::new(slots.allocate(), container, is_running)
                }
            };
            order.push(container.id.clone());
            entries.insert(container.id.clone(), entry);
        }
        summary.removed = self.entries.len() - summary.retained;

        let next = RegistryState {
            entries,
            order,
            running_names,
        };
        (next, summary)
    }

    fn ordered(&self) -> impl Iterator<Item = &BoxContainer> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}

pub struct ContainerRegistry {
    docker: Arc<dyn DockerApi>,
    state: RwLock<RegistryState>,
    /// Held from the first daemon query until the swap
    refresh_lock: Mutex<()>,
}

impl ContainerRegistry {
    pub fn new(docker: Arc<dyn DockerApi>) -> Self {
        Self {
            docker,
            state: RwLock::new(RegistryState::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Re-reads the daemon's container list and reconciles entries by ID.
    /// On error the previous snapshot is left as it was.
    pub async fn refresh(&self) -> Result<RefreshSummary, DockerError> {
        let _refreshing = self.refresh_lock.lock().await;

        let all = self.docker.list_containers(true).await?;
        let running = self.docker.list_containers(false).await?;

        let mut state = self.state.write().await;
        let (next, summary) = state.reconcile(&all, &running);
        *state = next;
        drop(state);

        if summary.added > 0 || summary.removed > 0 {
            info!(
                "Registry refreshed: {} added, {} removed, {} retained",
                summary.added, summary.removed, summary.retained
            );
        } else {
            debug!("Registry refreshed: {} containers unchanged", summary.retained);
        }
        Ok(summary)
    }

    /// Exact ID match, or the single entry whose ID starts with `id`.
    pub async fn lookup_by_id(&self, id: &str) -> Option<BoxContainer> {
        if id.is_empty() {
            return None;
        }
        let state = self.state.read().await;
        if let Some(entry) = state.entries.get(id) {
            return Some(entry.clone());
        }

        let mut matches = state.entries.values().filter(|e| e.id.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Matches the primary name; a leading `/` is ignored.
    pub async fn lookup_by_name(&self, name: &str) -> Option<BoxContainer> {
        let name = name.strip_prefix('/').unwrap_or(name);
        let state = self.state.read().await;
        state.ordered().find(|e| e.name == name).cloned()
    }

    /// Name first, then ID or ID prefix.
    pub async fn resolve(&self, key: &str) -> Option<BoxContainer> {
        match self.lookup_by_name(key).await {
            Some(entry) => Some(entry),
            None => self.lookup_by_id(key).await,
        }
    }

    /// True unless a running container reported `name` as its primary name
    /// at the last refresh.
    pub async fn is_stopped(&self, name: &str) -> bool {
        let name = name.strip_prefix('/').unwrap_or(name);
        !self.state.read().await.running_names.contains(name)
    }

    pub async fn all(&self) -> Vec<BoxContainer> {
        self.state.read().await.ordered().cloned().collect()
    }

    pub async fn running(&self) -> Vec<BoxContainer> {
        self.state
            .read()
            .await
            .ordered()
            .filter(|e| e.running)
            .cloned()
            .collect()
    }

    /// Stores the latest usage figures. Returns false when the container is no
    /// longer registered.
    pub async fn record_usage(&self, id: &str, cpu_percent: f64, memory_percent: f64) -> bool {
        let mut state = self.state.write().await;
        match state.entries.get_mut(id) {
            Some(entry) => {
                entry.cpu_percent = cpu_percent;
                entry.memory_percent = memory_percent;
                true
            }
            None => false,
        }
    }
}
