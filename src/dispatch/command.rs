//! Textual verbs and their arguments.

use serde::Serialize;

use super::error::DispatchError;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct HelpEntry {
    pub verb: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

impl HelpEntry {
    const fn new(verb: &'static str, usage: &'static str, description: &'static str) -> Self {
        Self { verb, usage, description }
    }
}

pub const HELP: &[HelpEntry] = &[
    HelpEntry::new("help", "help", "Show this list"),
    HelpEntry::new("ps", "ps [-a]", "List running containers, or all with -a"),
    HelpEntry::new("images", "images", "List installed images"),
    HelpEntry::new("rmi", "rmi <name | -a>", "Remove an image by repository name, or all images"),
    HelpEntry::new("rm", "rm <name | id>", "Remove a container"),
    HelpEntry::new("info", "info <name | id>", "Show container details and current usage"),
    HelpEntry::new("stats", "stats <name | id>", "Watch container usage until stopped"),
    HelpEntry::new("unwatch", "unwatch [name | id]", "Stop one watch, or all of them"),
    HelpEntry::new("refresh", "refresh", "Re-read containers from the daemon"),
];

fn usage(verb: &'static str) -> &'static str {
    HELP.iter()
        .find(|entry| entry.verb == verb)
        .map(|entry| entry.usage)
        .unwrap_or(verb)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    Named(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Ps { all: bool },
    Images,
    RemoveImage(ImageTarget),
    RemoveContainer(String),
    Info(String),
    Stats(String),
    Unwatch(Option<String>),
    Refresh,
}

impl Command {
    /// Parses a whole input line. Chat-style `/docker ps -a` is accepted as well as `ps -a`.
    pub fn from_line(line: &str) -> Result<Self, DispatchError> {
        let mut words: Vec<&str> = line.split_whitespace().collect();
        if let Some(first) = words.first_mut() {
            *first = first.strip_prefix('/').unwrap_or(*first);
        }
        if words.first() == Some(&"docker") {
            words.remove(0);
        }

        match words.split_first() {
            Some((verb, args)) => Self::parse(verb, args),
            None => Err(DispatchError::UnknownVerb(String::new())),
        }
    }

    pub fn parse(verb: &str, args: &[&str]) -> Result<Self, DispatchError> {
        let first = args.first().copied();

        let command = match verb.to_lowercase().as_str() {
            "help" => Command::Help,
            "ps" => Command::Ps {
                all: first.is_some_and(|flag| flag.starts_with('-') && flag.contains('a')),
            },
            "images" => Command::Images,
            "rmi" => match first {
                Some("-a") | Some("--all") => Command::RemoveImage(ImageTarget::All),
                Some(name) => Command::RemoveImage(ImageTarget::Named(name.to_string())),
                None => return Err(missing("rmi")),
            },
            "rm" => Command::RemoveContainer(first.ok_or_else(|| missing("rm"))?.to_string()),
            "info" => Command::Info(first.ok_or_else(|| missing("info"))?.to_string()),
            "stats" => Command::Stats(first.ok_or_else(|| missing("stats"))?.to_string()),
            "unwatch" => Command::Unwatch(first.map(str::to_string)),
            "refresh" => Command::Refresh,
            other => return Err(DispatchError::UnknownVerb(other.to_string())),
        };

        Ok(command)
    }
}

fn missing(verb: &'static str) -> DispatchError {
    DispatchError::MissingArgument { verb, usage: usage(verb) }
}
