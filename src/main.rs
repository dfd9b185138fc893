mod config;
mod container;
mod daemon;
mod dispatch;
mod docker;
mod image;
mod stats;
#[cfg(test)]
mod testing;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use container::ContainerRegistry;
use dispatch::render::{render, render_event};
use dispatch::{Dispatcher, Reply, WatchEvent};
use docker::{BollardClient, DockerApi};
use image::ImageCatalog;
use stats::StatsPoller;

#[derive(Parser)]
#[command(name = "mobybox")]
#[command(about = "Docker containers as addressable boxes", long_about = None)]
struct Cli {
    #[arg(long = "config", default_value = "config.json")]
    config: String,

    /// Print tracing logs
    #[arg(long = "dev")]
    dev: bool,

    #[arg(long = "host")]
    host: Option<String>,

    #[arg(long = "cert-path")]
    cert_path: Option<String>,

    /// Print replies as JSON
    #[arg(long = "json")]
    json: bool,

    /// Run a single command (e.g. `ps -a`) instead of the interactive console
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dev {
        tracing_subscriber::fmt::init();
    }

    let config = config::config::Config::load_or_default(&cli.config)
        .and_then(|c| c.with_overrides(cli.host.clone(), cli.cert_path.clone()))
        .with_context(|| format!("Failed to load {}", cli.config))?;

    let docker: Arc<dyn DockerApi> = Arc::new(
        BollardClient::connect(&config.docker).context("Failed to set up the Docker client")?,
    );
    daemon::start::check_docker(docker.as_ref())
        .await
        .context("Please ensure the Docker daemon is running and reachable")?;

    let registry = Arc::new(ContainerRegistry::new(docker.clone()));
    let catalog = Arc::new(ImageCatalog::new(docker.clone()));
    let poller = Arc::new(StatsPoller::new(
        docker.clone(),
        registry.clone(),
        Duration::from_secs(config.stats.sample_timeout_secs),
    ));
    let (dispatcher, events) = Dispatcher::new(docker, registry.clone(), catalog, poller.clone());

    if let Err(e) = registry.refresh().await {
        tracing::warn!("Initial registry refresh failed: {}", e);
    }

    if !cli.command.is_empty() {
        return run_once(&dispatcher, &poller, events, &cli.command.join(" "), cli.json).await;
    }

    daemon::start::print_banner(&config);

    let refresher = daemon::refresh::spawn_refresh_loop(
        registry,
        Duration::from_secs(config.registry.poll_rate_secs),
    );

    // Watch output arrives independently of the console input.
    let mut events = events;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("{}", render_event(&event));
        }
    });

    run_console(&dispatcher, cli.json).await?;

    poller.cancel_all();
    refresher.abort();
    drop(dispatcher);
    let _ = printer.await;
    Ok(())
}

fn print_reply(reply: &Reply, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reply)?);
    } else {
        println!("{}", render(reply));
    }
    Ok(())
}

async fn run_once(
    dispatcher: &Dispatcher,
    poller: &StatsPoller,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    line: &str,
    json: bool,
) -> anyhow::Result<()> {
    let reply = dispatcher.dispatch_line(line).await?;
    print_reply(&reply, json)?;

    if !matches!(reply, Reply::Watching { .. }) {
        return Ok(());
    }

    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                poller.cancel_all();
            }
            event = events.recv() => match event {
                Some(event) => {
                    println!("{}", render_event(&event));
                    if matches!(event, WatchEvent::Ended { .. }) {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    Ok(())
}

async fn run_console(dispatcher: &Dispatcher, json: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };

        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        match dispatcher.dispatch_line(line).await {
            Ok(reply) => print_reply(&reply, json)?,
            Err(e) => {
                tracing::debug!("Command {:?} failed: {:?}", line, e);
                eprintln!("Error: {}", e);
            }
        }
    }

    Ok(())
}
