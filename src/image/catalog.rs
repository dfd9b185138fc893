//! Image catalog
//!
//! On-demand image queries. Nothing is cached: every call goes to the daemon.

use std::sync::Arc;
use tracing::{info, warn};

use crate::docker::{DockerApi, DockerError, Image};

pub struct ImageCatalog {
    docker: Arc<dyn DockerApi>,
}

impl ImageCatalog {
    pub fn new(docker: Arc<dyn DockerApi>) -> Self {
        Self { docker }
    }

    /// Empty when the daemon has no images; `Connection` when it can't be reached.
    pub async fn list(&self) -> Result<Vec<Image>, DockerError> {
        self.docker.list_images().await
    }

    /// First image whose repository (any label, tag ignored) or full
    /// `repo:tag` label equals `name`.
    pub async fn find_by_repository(&self, name: &str) -> Result<Option<Image>, DockerError> {
        let images = self.list().await?;
        Ok(images.into_iter().find(|image| {
            image.repositories().any(|repo| repo == name)
                || image.repo_tags.iter().any(|t| t == name)
        }))
    }

    pub async fn remove(&self, id: &str) -> Result<(), DockerError> {
        self.docker.remove_image(id).await?;
        info!("Removed image {}", id);
        Ok(())
    }

    /// Removes the image `name` refers to and returns it.
    pub async fn remove_by_repository(&self, name: &str) -> Result<Image, DockerError> {
        let image = self
            .find_by_repository(name)
            .await?
            .ok_or_else(|| {
                DockerError::NotFound(format!("No image exists with the name \"{}\"", name))
            })?;
        self.remove(&image.id).await?;
        Ok(image)
    }

    /// Force-removes every image. Images that vanish mid-way (e.g. untagged
    /// parents removed together with a child) are not counted as failures.
    pub async fn remove_all(&self) -> Result<usize, DockerError> {
        let images = self.list().await?;
        let mut removed = 0;

        for image in &images {
            match self.docker.remove_image(&image.id).await {
                Ok(()) => removed += 1,
                Err(e) if e.is_not_found() => {
                    warn!("Image {} already gone", image.short_id());
                }
                Err(e) => return Err(e),
            }
        }

        info!("Removed {} of {} images", removed, images.len());
        Ok(removed)
    }
}

/// Human readable image size, e.g. `133.3 MB`.
pub fn format_size(bytes: u64) -> String {
    bytesize::ByteSize(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDocker, image};

    fn catalog(fake: &Arc<FakeDocker>) -> ImageCatalog {
        ImageCatalog::new(fake.clone())
    }

    #[tokio::test]
    async fn test_empty_daemon_is_distinct_from_unreachable() {
        let fake = Arc::new(FakeDocker::new());
        let catalog = catalog(&fake);
        assert!(catalog.list().await.unwrap().is_empty());

        fake.set_reachable(false);
        assert!(matches!(catalog.list().await, Err(DockerError::Connection(_))));
    }

    #[tokio::test]
    async fn test_find_by_repository_ignores_tag() {
        let fake = Arc::new(FakeDocker::new());
        fake.set_images(vec![
            image("sha256:aaa", &["nginx:latest"], 100),
            image("sha256:bbb", &["redis:7", "cache:prod"], 200),
        ]);
        let catalog = catalog(&fake);

        assert_eq!(catalog.find_by_repository("nginx").await.unwrap().unwrap().id, "sha256:aaa");
        assert_eq!(catalog.find_by_repository("cache").await.unwrap().unwrap().id, "sha256:bbb");
        assert_eq!(catalog.find_by_repository("redis:7").await.unwrap().unwrap().id, "sha256:bbb");
        assert!(catalog.find_by_repository("postgres").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_by_repository() {
        let fake = Arc::new(FakeDocker::new());
        fake.set_images(vec![image("sha256:aaa", &["nginx:latest"], 100)]);
        let catalog = catalog(&fake);

        let removed = catalog.remove_by_repository("nginx").await.unwrap();
        assert_eq!(removed.id, "sha256:aaa");
        assert!(fake.images().is_empty());

        let err = catalog.remove_by_repository("nginx").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_not_found() {
        let fake = Arc::new(FakeDocker::new());
        let err = catalog(&fake).remove("sha256:missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove_all() {
        let fake = Arc::new(FakeDocker::new());
        fake.set_images(vec![
            image("sha256:aaa", &["nginx:latest"], 100),
            image("sha256:bbb", &["redis:7"], 200),
        ]);
        let catalog = catalog(&fake);

        assert_eq!(catalog.remove_all().await.unwrap(), 2);
        assert_eq!(catalog.remove_all().await.unwrap(), 0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert!(format_size(133_300_000).contains("MB"));
    }
}
