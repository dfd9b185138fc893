//! Immutable snapshots of daemon state.
//!
//! These are the adapter's own types so the registry and poller never touch
//! bollard's wire structs directly.

use serde::Serialize;

const SHORT_ID_LEN: usize = 12;

/// First 12 characters of a container or image ID, the way `docker ps` shows it.
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Docker reports names as `/web`; everything above the adapter uses `web`.
pub fn strip_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub id: String,
    pub repo_tags: Vec<String>,
    pub size: u64,
    /// Unix seconds
    pub created: i64,
}

impl Image {
    /// Repository of the first label, e.g. `nginx` for `nginx:latest`.
    pub fn repository(&self) -> Option<&str> {
        self.repo_tags.first().map(|t| split_tag(t).0)
    }

    /// Tag of the first label.
    pub fn tag(&self) -> Option<&str> {
        self.repo_tags.first().and_then(|t| split_tag(t).1)
    }

    pub fn repositories(&self) -> impl Iterator<Item = &str> {
        self.repo_tags.iter().map(|t| split_tag(t).0)
    }

    pub fn short_id(&self) -> &str {
        short_id(self.id.strip_prefix("sha256:").unwrap_or(&self.id))
    }
}

/// Splits `repo:tag`, keeping registry ports (`localhost:5000/app:1.0`) in the repo part.
fn split_tag(label: &str) -> (&str, Option<&str>) {
    match label.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag)),
        _ => (label, None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub running: bool,
    /// Daemon-provided status line, e.g. `Up 3 hours` or `Exited (0) 2 days ago`
    pub status: String,
}

impl ContainerSummary {
    pub fn primary_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_else(|| short_id(&self.id))
    }

    #[allow(unused)]
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

impl From<bollard::models::ContainerSummary> for ContainerSummary {
    fn from(c: bollard::models::ContainerSummary) -> Self {
        let running = c.state.as_deref() == Some("running");
        Self {
            id: c.id.unwrap_or_default(),
            names: c
                .names
                .unwrap_or_default()
                .iter()
                .map(|n| strip_name(n).to_string())
                .collect(),
            image: c.image.unwrap_or_else(|| "<none>".to_string()),
            running,
            status: c.status.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

impl From<bollard::models::ImageSummary> for Image {
    fn from(i: bollard::models::ImageSummary) -> Self {
        Self {
            id: i.id,
            repo_tags: i.repo_tags,
            size: i.size.max(0) as u64,
            created: i.created,
        }
    }
}

/// Raw counters from one statistics report. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatSample {
    pub memory_usage: Option<u64>,
    pub memory_limit: Option<u64>,
    /// Cumulative CPU time used by the container since it started
    pub cpu_total_usage: Option<u64>,
    /// Cumulative host CPU time
    pub system_cpu_usage: Option<u64>,
}

impl From<bollard::container::Stats> for StatSample {
    fn from(stats: bollard::container::Stats) -> Self {
        Self {
            memory_usage: stats.memory_stats.usage,
            memory_limit: stats.memory_stats.limit,
            cpu_total_usage: Some(stats.cpu_stats.cpu_usage.total_usage),
            system_cpu_usage: stats.cpu_stats.system_cpu_usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_takes_twelve_chars() {
        assert_eq!(short_id("abc123123456789abcdef"), "abc123123456");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_primary_name_is_first_name() {
        let c = ContainerSummary {
            id: "abc123123456789".to_string(),
            names: vec!["web".to_string(), "web-alias".to_string()],
            image: "nginx".to_string(),
            running: true,
            status: "Up 1 second".to_string(),
        };
        assert_eq!(c.primary_name(), "web");
        assert_eq!(c.short_id(), "abc123123456");
    }

    #[test]
    fn test_bollard_summary_strips_slash_and_reads_state() {
        let raw = bollard::models::ContainerSummary {
            id: Some("deadbeefcafe0000".to_string()),
            names: Some(vec!["/db".to_string()]),
            image: Some("postgres:16".to_string()),
            state: Some("exited".to_string()),
            ..Default::default()
        };
        let c = ContainerSummary::from(raw);
        assert_eq!(c.names, vec!["db".to_string()]);
        assert!(!c.running);
        assert_eq!(c.status, "unknown");
    }

    #[test]
    fn test_image_repository_and_tag() {
        let image = Image {
            id: "sha256:0123456789abcdef0123".to_string(),
            repo_tags: vec!["localhost:5000/app:1.2".to_string(), "app:latest".to_string()],
            size: 10,
            created: 0,
        };
        assert_eq!(image.repository(), Some("localhost:5000/app"));
        assert_eq!(image.tag(), Some("1.2"));
        assert_eq!(image.repositories().collect::<Vec<_>>(), vec!["localhost:5000/app", "app"]);
        assert_eq!(image.short_id(), "0123456789ab");
    }

    #[test]
    fn test_untagged_image_has_no_repository() {
        let image = Image { id: "x".to_string(), repo_tags: vec![], size: 0, created: 0 };
        assert_eq!(image.repository(), None);
        assert_eq!(image.tag(), None);
    }
}
