//! Stats poller
//!
//! Per-container subscriptions over the daemon's statistics feed. Each sample
//! is turned into a `UsageSample`, handed to the subscriber and written back
//! to the registry. At most one subscription per container is active: starting
//! another one supersedes (cancels) the previous.

use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tracing::{debug, info, warn};

use super::usage::UsageSample;
use crate::container::registry::ContainerRegistry;
use crate::docker::{DockerApi, DockerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubscriptionState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SubscriptionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Completed | SubscriptionState::Cancelled | SubscriptionState::Failed
        )
    }
}

/// Why a subscription ended. Delivered exactly once per subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// The daemon closed the feed, usually because the container stopped
    Completed,
    Cancelled,
    Failed(DockerError),
}

impl Terminal {
    pub fn state(&self) -> SubscriptionState {
        match self {
            Terminal::Completed => SubscriptionState::Completed,
            Terminal::Cancelled => SubscriptionState::Cancelled,
            Terminal::Failed(_) => SubscriptionState::Failed,
        }
    }
}

struct SubscriptionInner {
    container_id: String,
    generation: u64,
    cancelled: AtomicBool,
    cancel: Notify,
    /// Held for the cancelled check plus the `on_sample` call
    delivery: Mutex<()>,
    /// Thread currently inside `on_sample`, if any
    delivering_on: Mutex<Option<ThreadId>>,
    state: watch::Sender<SubscriptionState>,
}

/// Handle to a running subscription. Cheap to clone; `cancel` works from any thread.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    fn new(container_id: &str, generation: u64) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Idle);
        Self {
            inner: Arc::new(SubscriptionInner {
                container_id: container_id.to_string(),
                generation,
                cancelled: AtomicBool::new(false),
                cancel: Notify::new(),
                delivery: Mutex::new(()),
                delivering_on: Mutex::new(None),
                state,
            }),
        }
    }

    #[allow(unused)]
    pub fn container_id(&self) -> &str {
        &self.inner.container_id
    }

    #[allow(unused)]
    pub fn state(&self) -> SubscriptionState {
        *self.inner.state.borrow()
    }

    /// Stops delivery. Waits for an `on_sample` call already in progress on
    /// another thread, so none runs after this returns. Safe to call from
    /// inside `on_sample`. A no-op once the subscription has terminated.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.notify_one();

        let delivering_on = *self
            .inner
            .delivering_on
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if delivering_on != Some(thread::current().id()) {
            drop(self.inner.delivery.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Runs `on_sample` unless cancelled. Returns false when cancelled.
    fn deliver<S>(&self, usage: &UsageSample, on_sample: &S) -> bool
    where
        S: Fn(&UsageSample),
    {
        let _delivery = self.inner.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            return false;
        }

        self.set_delivering_on(Some(thread::current().id()));
        on_sample(usage);
        self.set_delivering_on(None);
        true
    }

    fn set_delivering_on(&self, on: Option<ThreadId>) {
        *self
            .inner
            .delivering_on
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = on;
    }

    /// Resolves once the terminal callback has run.
    #[allow(unused)]
    pub async fn finished(&self) -> SubscriptionState {
        let mut rx = self.inner.state.subscribe();
        match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => SubscriptionState::Cancelled,
        }
    }
}

pub struct StatsPoller {
    docker: Arc<dyn DockerApi>,
    registry: Arc<ContainerRegistry>,
    active: Arc<DashMap<String, Subscription>>,
    generation: AtomicU64,
    sample_timeout: Duration,
}

impl StatsPoller {
    pub fn new(
        docker: Arc<dyn DockerApi>,
        registry: Arc<ContainerRegistry>,
        sample_timeout: Duration,
    ) -> Self {
        Self {
            docker,
            registry,
            active: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            sample_timeout,
        }
    }

    /// Opens a continuous subscription for `container_id` (a full ID).
    pub fn start<S, T>(&self, container_id: &str, on_sample: S, on_terminal: T) -> Subscription
    where
        S: Fn(&UsageSample) + Send + 'static,
        T: FnOnce(Terminal) + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let subscription = Subscription::new(container_id, generation);

        let previous = self.active.insert(container_id.to_string(), subscription.clone());
        if let Some(previous) = previous {
            info!("Superseding stats subscription for {}", container_id);
            previous.cancel();
        }

        let docker = self.docker.clone();
        let registry = self.registry.clone();
        let active = self.active.clone();
        let task_subscription = subscription.clone();

        tokio::spawn(async move {
            Self::stream_loop(docker, registry, active, task_subscription, on_sample, on_terminal)
                .await;
        });

        subscription
    }

    async fn stream_loop<S, T>(
        docker: Arc<dyn DockerApi>,
        registry: Arc<ContainerRegistry>,
        active: Arc<DashMap<String, Subscription>>,
        subscription: Subscription,
        on_sample: S,
        on_terminal: T,
    ) where
        S: Fn(&UsageSample) + Send + 'static,
        T: FnOnce(Terminal) + Send + 'static,
    {
        let inner = &subscription.inner;
        let container_id = inner.container_id.clone();

        inner.state.send_replace(SubscriptionState::Streaming);
        info!("Starting stats subscription for {}", container_id);

        let mut stream = docker.stats_stream(&container_id);

        let terminal = loop {
            tokio::select! {
                biased;
                _ = inner.cancel.notified() => break Terminal::Cancelled,
                next = stream.next() => match next {
                    None => break Terminal::Completed,
                    Some(Ok(raw)) => match UsageSample::from_sample(&container_id, &raw) {
                        Ok(usage) => {
                            debug!(
                                "Stats for {}: cpu {:.2}% mem {:.2}%",
                                container_id, usage.cpu_percent, usage.memory_percent
                            );
                            if !subscription.deliver(&usage, &on_sample) {
                                break Terminal::Cancelled;
                            }
                            registry
                                .record_usage(
                                    &container_id,
                                    usage.cpu_percent,
                                    usage.memory_percent,
                                )
                                .await;
                        }
                        Err(e) => warn!("Skipping stats sample for {}: {}", container_id, e),
                    },
                    Some(Err(DockerError::MalformedSample(msg))) => {
                        warn!("Skipping stats sample for {}: {}", container_id, msg);
                    }
                    Some(Err(e)) => break Terminal::Failed(e),
                },
            }
        };

        // Closes the feed before anyone hears about the terminal state.
        drop(stream);

        let terminal = if subscription.is_cancelled() {
            Terminal::Cancelled
        } else {
            terminal
        };

        active.remove_if(&container_id, |_, current| {
            current.inner.generation == inner.generation
        });

        match &terminal {
            Terminal::Failed(e) => warn!("Stats subscription for {} failed: {}", container_id, e),
            other => info!("Stats subscription for {} ended: {:?}", container_id, other),
        }

        let state = terminal.state();
        on_terminal(terminal);
        inner.state.send_replace(state);
    }

    /// Waits for the first well-formed sample, then closes the feed.
    pub async fn sample_once(&self, container_id: &str) -> Result<UsageSample, DockerError> {
        let mut stream = self.docker.stats_stream(container_id);

        let first = tokio::time::timeout(self.sample_timeout, async {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(raw) => match UsageSample::from_sample(container_id, &raw) {
                        Ok(usage) => return Ok(usage),
                        Err(e) => warn!("Skipping stats sample for {}: {}", container_id, e),
                    },
                    Err(DockerError::MalformedSample(msg)) => {
                        warn!("Skipping stats sample for {}: {}", container_id, msg);
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(DockerError::Connection(format!(
                "stats stream for {} closed before a sample arrived",
                container_id
            )))
        })
        .await;

        drop(stream);

        let usage = match first {
            Ok(result) => result?,
            Err(_) => {
                return Err(DockerError::Connection(format!(
                    "no stats for {} within {}s",
                    container_id,
                    self.sample_timeout.as_secs_f32()
                )));
            }
        };

        self.registry
            .record_usage(container_id, usage.cpu_percent, usage.memory_percent)
            .await;
        Ok(usage)
    }

    /// Cancels the active subscription for `container_id`, if any.
    pub fn cancel(&self, container_id: &str) -> bool {
        match self.active.remove(container_id) {
            Some((_, subscription)) => {
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let ids = self.active();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// IDs with an active subscription.
    pub fn active(&self) -> Vec<String> {
        self.active.iter().map(|entry| entry.key().clone()).collect()
    }
}
