//! Docker client adapter
//!
//! `DockerApi` is the seam between the registry/poller and the daemon.
//! `BollardClient` talks to a real daemon; tests use an in-memory fake.

use async_trait::async_trait;
use bollard::container::{ListContainersOptions, RemoveContainerOptions, StatsOptions};
use bollard::image::{ListImagesOptions, RemoveImageOptions};
use bollard::{API_DEFAULT_VERSION, Docker};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::error::DockerError;
use super::models::{ContainerSummary, Image, StatSample};
use crate::config::config::DockerConfig;

/// Lazy, daemon-paced feed of statistics reports. Dropping it closes the feed.
pub type StatsStream = BoxStream<'static, Result<StatSample, DockerError>>;

#[async_trait]
pub trait DockerApi: Send + Sync {
    async fn ping(&self) -> Result<(), DockerError>;

    async fn list_images(&self) -> Result<Vec<Image>, DockerError>;

    async fn list_containers(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerSummary>, DockerError>;

    /// Forced removal, even when the image is referenced by containers.
    async fn remove_image(&self, id: &str) -> Result<(), DockerError>;

    async fn remove_container(&self, id: &str) -> Result<(), DockerError>;

    /// Opens an unbounded statistics feed for one container.
    fn stats_stream(&self, id: &str) -> StatsStream;
}

#[derive(Clone)]
pub struct BollardClient {
    docker: Docker,
}

impl BollardClient {
    pub fn connect(config: &DockerConfig) -> Result<Self, DockerError> {
        let timeout = config.timeout_secs;

        let docker = match config.host.as_deref() {
            None => Docker::connect_with_local_defaults()?,
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_socket(host, timeout, API_DEFAULT_VERSION)?
            }
            Some(host) => match config.cert_path.as_deref() {
                Some(cert_dir) => {
                    let dir = Path::new(cert_dir);
                    tracing::info!("Connecting to Docker at {} over TLS ({})", host, cert_dir);
                    Docker::connect_with_ssl(
                        host,
                        &dir.join("key.pem"),
                        &dir.join("cert.pem"),
                        &dir.join("ca.pem"),
                        timeout,
                        API_DEFAULT_VERSION,
                    )?
                }
                None => {
                    tracing::info!("Connecting to Docker at {}", host);
                    Docker::connect_with_http(host, timeout, API_DEFAULT_VERSION)?
                }
            },
        };

        Ok(Self { docker })
    }
}

#[async_trait]
impl DockerApi for BollardClient {
    async fn ping(&self) -> Result<(), DockerError> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<Image>, DockerError> {
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };

        let images = self.docker.list_images(Some(options)).await?;
        Ok(images.into_iter().map(Image::from).collect())
    }

    async fn list_containers(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerSummary>, DockerError> {
        let options = ListContainersOptions::<String> {
            all: include_stopped,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers.into_iter().map(ContainerSummary::from).collect())
    }

    async fn remove_image(&self, id: &str) -> Result<(), DockerError> {
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };

        let deleted = self.docker.remove_image(id, Some(options), None).await?;
        debug!("Removed image {} ({} layers affected)", id, deleted.len());
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), DockerError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker.remove_container(id, Some(options)).await?;
        Ok(())
    }

    fn stats_stream(&self, id: &str) -> StatsStream {
        let docker = self.docker.clone();
        let container_id = id.to_string();
        let (tx, rx) = mpsc::channel(16);

        // The forwarder owns the HTTP stream; it exits (dropping the stream and
        // its connection) as soon as the consumer goes away or the daemon ends it.
        tokio::spawn(async move {
            let stats_opts = StatsOptions {
                stream: true,
                one_shot: false,
            };
            let mut stats_stream = docker.stats(&container_id, Some(stats_opts));

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!("Stats consumer for {} went away", container_id);
                        break;
                    }
                    next = stats_stream.next() => match next {
                        Some(result) => {
                            let item = result.map(StatSample::from).map_err(DockerError::from);
                            if tx.send(item).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }

            debug!("Stats stream closed for {}", container_id);
        });

        ReceiverStream::new(rx).boxed()
    }
}
