//! Plain-text rendering of replies and watch events.

use chrono::{DateTime, Local};

use super::dispatcher::{Reply, WatchEvent};
use crate::container::BoxContainer;
use crate::image::format_size;
use crate::stats::{Terminal, UsageSample, format_percent};

const BAR: &str = "=============================================";

pub fn render(reply: &Reply) -> String {
    let mut out = Vec::new();

    match reply {
        Reply::Help { entries } => {
            out.push("================ Docker Help ================".to_string());
            out.push("= <arg> is required, [arg] is optional".to_string());
            for entry in entries {
                out.push(format!("{:<24} {}", entry.usage, entry.description));
            }
        }
        Reply::Containers { all, boxes } => {
            if boxes.is_empty() {
                out.push(if *all {
                    "No containers currently existing.".to_string()
                } else {
                    "No containers currently running.".to_string()
                });
            } else {
                out.push(BAR.to_string());
                out.push(if *all {
                    "Box, Name(s), Image, Container ID, Status".to_string()
                } else {
                    "Box, Name(s), Image, Container ID".to_string()
                });
                out.push(BAR.to_string());
                for entry in boxes {
                    let names = if entry.names.is_empty() {
                        entry.name.clone()
                    } else {
                        entry.names.join(", ")
                    };
                    let mut line = format!(
                        "{}, {}, {}, {}",
                        entry.placement,
                        names,
                        entry.image,
                        entry.short_id()
                    );
                    if *all {
                        line.push_str(if entry.running { ", running" } else { ", stopped" });
                    }
                    out.push(line);
                }
            }
        }
        Reply::Images { images } => {
            if images.is_empty() {
                out.push("No images currently installed.".to_string());
            } else {
                out.push(BAR.to_string());
                out.push("Repository, Tag, Image ID, Size".to_string());
                out.push(BAR.to_string());
                for image in images {
                    let repositories: Vec<&str> = image.repositories().collect();
                    let repositories = if repositories.is_empty() {
                        "<none>".to_string()
                    } else {
                        repositories.join(", ")
                    };
                    out.push(format!(
                        "{}, {}, {}, {}",
                        repositories,
                        image.tag().unwrap_or("<none>"),
                        image.short_id(),
                        format_size(image.size)
                    ));
                }
            }
        }
        Reply::ImageRemoved { image } => {
            out.push(format!(
                "Removed image with name \"{}\"",
                image.repository().unwrap_or_else(|| image.short_id())
            ));
        }
        Reply::ImagesRemoved { count: 0 } => out.push("No images currently installed.".to_string()),
        Reply::ImagesRemoved { count } => out.push(format!("Removed all images ({}).", count)),
        Reply::ContainerRemoved { name, .. } => out.push(format!("Removed container \"{}\"", name)),
        Reply::Info { entry, usage } => {
            out.push("=========== Container Information ===========".to_string());
            out.extend(info_lines(entry));
            if let Some(usage) = usage {
                out.extend(usage_lines(usage));
            }
        }
        Reply::Watching { name, .. } => {
            out.push(format!("Watching \"{}\". Use unwatch to stop.", name));
        }
        Reply::Unwatched { count: 0 } => out.push("Nothing was being watched.".to_string()),
        Reply::Unwatched { count } => out.push(format!("Stopped {} watch(es).", count)),
        Reply::Refreshed { summary } => out.push(format!(
            "Refreshed: {} new, {} removed, {} unchanged.",
            summary.added, summary.removed, summary.retained
        )),
    }

    out.join("\n")
}

pub fn render_event(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Sample { name, usage } => {
            let at: DateTime<Local> = usage.sampled_at.into();
            format!(
                "[{}] {}: CPU {} | Memory {}",
                at.format("%H:%M:%S"),
                name,
                format_percent(usage.cpu_percent),
                format_percent(usage.memory_percent)
            )
        }
        WatchEvent::Ended { name, terminal } => match terminal {
            Terminal::Completed => format!("Stats for \"{}\" ended (container stopped).", name),
            Terminal::Cancelled => format!("Stopped watching \"{}\".", name),
            Terminal::Failed(e) => format!("Stats for \"{}\" failed: {}", name, e),
        },
    }
}

fn info_lines(entry: &BoxContainer) -> Vec<String> {
    vec![
        format!("Name: {}", entry.name),
        format!("Image: {}", entry.image),
        format!("ID: {}", entry.short_id()),
        format!("Box: {}", entry.placement),
        format!("Status: {}", entry.status),
    ]
}

fn usage_lines(usage: &UsageSample) -> Vec<String> {
    vec![
        format!("Memory Usage: {}", format_percent(usage.memory_percent)),
        format!("CPU Usage: {}", format_percent(usage.cpu_percent)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::RefreshSummary;
    use crate::container::state::PlacementToken;
    use crate::testing::{container, image};

    #[test]
    fn test_empty_lists_have_explicit_messages() {
        let text = render(&Reply::Containers { all: false, boxes: vec![] });
        assert_eq!(text, "No containers currently running.");
        let text = render(&Reply::Images { images: vec![] });
        assert_eq!(text, "No images currently installed.");
    }

    #[test]
    fn test_ps_all_shows_state() {
        let entry = BoxContainer::new(
            PlacementToken::new(2),
            &container("abc123123456789", "web", "nginx", false),
            false,
        );
        let text = render(&Reply::Containers { all: true, boxes: vec![entry] });
        assert!(text.ends_with("#2, web, nginx, abc123123456, stopped"));
    }

    #[test]
    fn test_ps_lists_every_name() {
        let mut summary = container("abc123123456789", "web", "nginx", true);
        summary.names.push("proxy/web".to_string());
        let entry = BoxContainer::new(PlacementToken::new(0), &summary, true);
        let text = render(&Reply::Containers { all: false, boxes: vec![entry] });
        assert!(text.contains("Box, Name(s), Image, Container ID"));
        assert!(text.ends_with("#0, web, proxy/web, nginx, abc123123456"));
    }

    #[test]
    fn test_images_row() {
        let text = render(&Reply::Images {
            images: vec![image("sha256:0123456789abcdef", &["nginx:latest"], 0)],
        });
        assert!(text.ends_with("nginx, latest, 0123456789ab, 0 B"));
    }

    #[test]
    fn test_info_with_unknown_usage() {
        let entry = BoxContainer::new(
            PlacementToken::new(0),
            &container("abc123123456789", "web", "nginx", true),
            true,
        );
        let usage = UsageSample {
            container_id: entry.id.clone(),
            cpu_percent: f64::NAN,
            memory_percent: 50.0,
            memory_usage: 50,
            memory_limit: Some(100),
            sampled_at: chrono::Utc::now(),
        };
        let text = render(&Reply::Info { entry, usage: Some(usage) });
        assert!(text.contains("Memory Usage: 50.00%"));
        assert!(text.contains("CPU Usage: unknown"));
        assert!(text.contains("Status: Up 5 minutes"));
    }

    #[test]
    fn test_refreshed() {
        let text = render(&Reply::Refreshed {
            summary: RefreshSummary { added: 1, removed: 2, retained: 3 },
        });
        assert_eq!(text, "Refreshed: 1 new, 2 removed, 3 unchanged.");
    }
}
