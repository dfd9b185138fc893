//! In-memory `DockerApi` used by unit tests.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::docker::{ContainerSummary, DockerApi, DockerError, Image, StatSample, StatsStream};

pub type FeedSender = mpsc::UnboundedSender<Result<StatSample, DockerError>>;

pub fn container(id: &str, name: &str, image: &str, running: bool) -> ContainerSummary {
    ContainerSummary {
        id: id.to_string(),
        names: vec![name.to_string()],
        image: image.to_string(),
        running,
        status: if running { "Up 5 minutes" } else { "Exited (0) 1 hour ago" }.to_string(),
    }
}

pub fn image(id: &str, tags: &[&str], size: u64) -> Image {
    Image {
        id: id.to_string(),
        repo_tags: tags.iter().map(|t| t.to_string()).collect(),
        size,
        created: 1_700_000_000,
    }
}

pub fn sample(usage: u64, limit: u64, total: u64, system: u64) -> StatSample {
    StatSample {
        memory_usage: Some(usage),
        memory_limit: Some(limit),
        cpu_total_usage: Some(total),
        system_cpu_usage: Some(system),
    }
}

pub struct FakeDocker {
    reachable: AtomicBool,
    containers: Mutex<Vec<ContainerSummary>>,
    images: Mutex<Vec<Image>>,
    feeds: Mutex<HashMap<String, mpsc::UnboundedReceiver<Result<StatSample, DockerError>>>>,
    running_stall: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl FakeDocker {
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            containers: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
            feeds: Mutex::new(HashMap::new()),
            running_stall: Mutex::new(None),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_containers(&self, containers: Vec<ContainerSummary>) {
        *self.containers.lock().unwrap() = containers;
    }

    pub fn set_images(&self, images: Vec<Image>) {
        *self.images.lock().unwrap() = images;
    }

    pub fn images(&self) -> Vec<Image> {
        self.images.lock().unwrap().clone()
    }

    /// Registers the stats feed the next `stats_stream(id)` call will hand out.
    pub fn feed(&self, id: &str) -> FeedSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().insert(id.to_string(), rx);
        tx
    }

    /// Makes the next running-only listing stall after reading the container
    /// list. The first notify fires once it has stalled; notify the second to
    /// let it return.
    pub fn stall_running_query(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.running_stall.lock().unwrap() = Some((entered.clone(), release.clone()));
        (entered, release)
    }

    fn check(&self) -> Result<(), DockerError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DockerError::Connection("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl DockerApi for FakeDocker {
    async fn ping(&self) -> Result<(), DockerError> {
        self.check()
    }

    async fn list_images(&self) -> Result<Vec<Image>, DockerError> {
        self.check()?;
        Ok(self.images())
    }

    async fn list_containers(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerSummary>, DockerError> {
        self.check()?;
        let listed: Vec<ContainerSummary> = self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|c| include_stopped || c.running)
            .cloned()
            .collect();

        if !include_stopped {
            let stall = self.running_stall.lock().unwrap().take();
            if let Some((entered, release)) = stall {
                entered.notify_one();
                release.notified().await;
            }
        }
        Ok(listed)
    }

    async fn remove_image(&self, id: &str) -> Result<(), DockerError> {
        self.check()?;
        let mut images = self.images.lock().unwrap();
        let before = images.len();
        images.retain(|i| i.id != id);
        if images.len() == before {
            return Err(DockerError::NotFound(format!("No such image: {}", id)));
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), DockerError> {
        self.check()?;
        let mut containers = self.containers.lock().unwrap();
        let before = containers.len();
        containers.retain(|c| c.id != id);
        if containers.len() == before {
            return Err(DockerError::NotFound(format!("No such container: {}", id)));
        }
        Ok(())
    }

    fn stats_stream(&self, id: &str) -> StatsStream {
        if let Err(e) = self.check() {
            return futures::stream::iter(vec![Err(e)]).boxed();
        }
        match self.feeds.lock().unwrap().remove(id) {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => futures::stream::iter(vec![Err(DockerError::NotFound(format!(
                "No such container: {}",
                id
            )))])
            .boxed(),
        }
    }
}
