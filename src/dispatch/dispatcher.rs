//! Command dispatcher
//!
//! Runs a parsed `Command` against the registry, image catalog, stats poller
//! and Docker adapter, and hands back a typed `Reply` for the front end to
//! render. Watch output is delivered asynchronously on the `WatchEvent`
//! channel returned from `Dispatcher::new`.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::command::{Command, HELP, HelpEntry, ImageTarget};
use super::error::DispatchError;
use crate::container::{BoxContainer, ContainerRegistry, RefreshSummary};
use crate::docker::{DockerApi, Image};
use crate::image::ImageCatalog;
use crate::stats::{StatsPoller, Terminal, UsageSample};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Help { entries: Vec<HelpEntry> },
    Containers { all: bool, boxes: Vec<BoxContainer> },
    Images { images: Vec<Image> },
    ImageRemoved { image: Image },
    ImagesRemoved { count: usize },
    ContainerRemoved { name: String, id: String },
    Info { entry: BoxContainer, usage: Option<UsageSample> },
    Watching { name: String, id: String },
    Unwatched { count: usize },
    Refreshed { summary: RefreshSummary },
}

#[derive(Debug, Clone)]
pub enum WatchEvent {
    Sample { name: String, usage: UsageSample },
    Ended { name: String, terminal: Terminal },
}

pub struct Dispatcher {
    docker: Arc<dyn DockerApi>,
    registry: Arc<ContainerRegistry>,
    catalog: Arc<ImageCatalog>,
    poller: Arc<StatsPoller>,
    event_tx: mpsc::UnboundedSender<WatchEvent>,
}

impl Dispatcher {
    pub fn new(
        docker: Arc<dyn DockerApi>,
        registry: Arc<ContainerRegistry>,
        catalog: Arc<ImageCatalog>,
        poller: Arc<StatsPoller>,
    ) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                docker,
                registry,
                catalog,
                poller,
                event_tx,
            },
            event_rx,
        )
    }

    pub async fn dispatch_line(&self, line: &str) -> Result<Reply, DispatchError> {
        let command = Command::from_line(line)?;
        self.dispatch(command).await
    }

    pub async fn dispatch(&self, command: Command) -> Result<Reply, DispatchError> {
        tracing::debug!("Dispatching {:?}", command);

        match command {
            Command::Help => Ok(Reply::Help { entries: HELP.to_vec() }),
            Command::Ps { all } => {
                self.registry.refresh().await?;
                let boxes = if all {
                    self.registry.all().await
                } else {
                    self.registry.running().await
                };
                Ok(Reply::Containers { all, boxes })
            }
            Command::Images => Ok(Reply::Images {
                images: self.catalog.list().await?,
            }),
            Command::RemoveImage(ImageTarget::All) => Ok(Reply::ImagesRemoved {
                count: self.catalog.remove_all().await?,
            }),
            Command::RemoveImage(ImageTarget::Named(name)) => {
                match self.catalog.remove_by_repository(&name).await {
                    Ok(image) => Ok(Reply::ImageRemoved { image }),
                    Err(e) if e.is_not_found() => Err(DispatchError::NoSuchImage(name)),
                    Err(e) => Err(e.into()),
                }
            }
            Command::RemoveContainer(key) => {
                let entry = self.resolve(&key).await?;
                self.poller.cancel(&entry.id);
                self.docker.remove_container(&entry.id).await?;
                tracing::info!("Removed container {} ({})", entry.name, entry.short_id());
                self.registry.refresh().await?;
                Ok(Reply::ContainerRemoved {
                    name: entry.name,
                    id: entry.id,
                })
            }
            Command::Info(key) => {
                self.registry.refresh().await?;
                let entry = self.lookup(&key).await?;
                let usage = if self.registry.is_stopped(&entry.name).await {
                    None
                } else {
                    match self.poller.sample_once(&entry.id).await {
                        Ok(usage) => Some(usage),
                        Err(e) => {
                            tracing::warn!("No stats for {}: {}", entry.name, e);
                            None
                        }
                    }
                };
                // Re-read so the entry carries the usage just recorded.
                let entry = self.registry.lookup_by_id(&entry.id).await.unwrap_or(entry);
                Ok(Reply::Info { entry, usage })
            }
            Command::Stats(key) => {
                let entry = self.resolve(&key).await?;
                if self.registry.is_stopped(&entry.name).await {
                    return Err(DispatchError::NotRunning(entry.name));
                }
                self.watch(&entry);
                Ok(Reply::Watching {
                    name: entry.name,
                    id: entry.id,
                })
            }
            Command::Unwatch(Some(key)) => {
                let id = match self.registry.resolve(&key).await {
                    Some(entry) => entry.id,
                    None => key,
                };
                let count = usize::from(self.poller.cancel(&id));
                Ok(Reply::Unwatched { count })
            }
            Command::Unwatch(None) => Ok(Reply::Unwatched {
                count: self.poller.cancel_all(),
            }),
            Command::Refresh => Ok(Reply::Refreshed {
                summary: self.registry.refresh().await?,
            }),
        }
    }

    fn watch(&self, entry: &BoxContainer) {
        let sample_tx = self.event_tx.clone();
        let sample_name = entry.name.clone();
        let terminal_tx = self.event_tx.clone();
        let terminal_name = entry.name.clone();

        self.poller.start(
            &entry.id,
            move |usage| {
                let _ = sample_tx.send(WatchEvent::Sample {
                    name: sample_name.clone(),
                    usage: usage.clone(),
                });
            },
            move |terminal| {
                let _ = terminal_tx.send(WatchEvent::Ended {
                    name: terminal_name,
                    terminal,
                });
            },
        );
    }

    async fn lookup(&self, key: &str) -> Result<BoxContainer, DispatchError> {
        self.registry
            .resolve(key)
            .await
            .ok_or_else(|| DispatchError::NoSuchContainer(key.to_string()))
    }

    /// Looks `key` up, refreshing once if the registry doesn't know it yet.
    async fn resolve(&self, key: &str) -> Result<BoxContainer, DispatchError> {
        if let Some(entry) = self.registry.resolve(key).await {
            return Ok(entry);
        }
        self.registry.refresh().await?;
        self.lookup(key).await
    }
}
