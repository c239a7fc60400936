use super::player::AudioPlayer;
use super::policy::AlertPolicy;
use crate::detection::Detection;
use crate::prelude::{AlertConfig, AlertError};
use crate::telemetry::log::LogManager;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The detection does not qualify for an alert.
    Ignored,
    Queued,
    /// The queue was full or already shut down.
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub queued: usize,
    pub rejected: usize,
    pub played: usize,
    pub failed: usize,
}

#[derive(Default)]
struct DispatchStats {
    queued: AtomicUsize,
    rejected: AtomicUsize,
    played: AtomicUsize,
    failed: AtomicUsize,
}

struct AlertJob {
    label: String,
    asset: PathBuf,
}

/// Bounded pool of playback workers fed through a bounded queue.
///
/// Every qualifying detection is offered to the queue; there is no
/// de-duplication or cooldown. When the queue is full the alert is rejected
/// and counted rather than spawning more work. [`AlertDispatcher::shutdown`]
/// closes the queue and waits for the workers up to the configured timeout.
pub struct AlertDispatcher {
    policy: AlertPolicy,
    asset: PathBuf,
    sender: Option<mpsc::Sender<AlertJob>>,
    workers: Vec<JoinHandle<()>>,
    runtime: Option<Runtime>,
    stats: Arc<DispatchStats>,
    shutdown_timeout: Duration,
    logger: LogManager,
}

impl AlertDispatcher {
    pub fn new(config: &AlertConfig, player: Arc<dyn AudioPlayer>) -> Result<Self, AlertError> {
        Self::with_policy(
            config,
            AlertPolicy::from_config(config),
            player,
        )
    }

    pub fn with_policy(
        config: &AlertConfig,
        policy: AlertPolicy,
        player: Arc<dyn AudioPlayer>,
    ) -> Result<Self, AlertError> {
        let worker_count = config.workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_count)
            .thread_name("alert-worker")
            .enable_time()
            .build()
            .map_err(|e| AlertError::Runtime(e.to_string()))?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(DispatchStats::default());

        let workers = (0..worker_count)
            .map(|id| {
                runtime.spawn(run_worker(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&player),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        Ok(Self {
            policy,
            asset: config.asset.clone(),
            sender: Some(sender),
            workers,
            runtime: Some(runtime),
            stats,
            shutdown_timeout: config.shutdown_timeout(),
            logger: LogManager::new("alerts"),
        })
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    pub fn maybe_alert(&self, detection: &Detection) -> DispatchOutcome {
        if !self.policy.should_alert(detection) {
            return DispatchOutcome::Ignored;
        }

        let job = AlertJob {
            label: detection.class_label.clone(),
            asset: self.asset.clone(),
        };
        let accepted = match &self.sender {
            Some(sender) => sender.try_send(job).is_ok(),
            None => false,
        };

        if accepted {
            self.stats.queued.fetch_add(1, Ordering::Relaxed);
            DispatchOutcome::Queued
        } else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            self.logger.warn(&format!(
                "alert for {} rejected: playback queue full or closed",
                detection.class_label
            ));
            DispatchOutcome::Rejected
        }
    }

    pub fn stats(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            queued: self.stats.queued.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            played: self.stats.played.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting alerts and joins the workers. Returns `false` if the
    /// timeout elapsed with playback still outstanding. Idempotent.
    pub fn shutdown(&mut self) -> bool {
        self.sender.take();
        let Some(runtime) = self.runtime.take() else {
            return true;
        };

        let workers = std::mem::take(&mut self.workers);
        let timeout = self.shutdown_timeout;
        let drained = runtime.block_on(async move {
            tokio::time::timeout(timeout, async move {
                for worker in workers {
                    let _ = worker.await;
                }
            })
            .await
            .is_ok()
        });
        runtime.shutdown_timeout(Duration::from_millis(100));

        if !drained {
            self.logger.warn(&format!(
                "alert playback still running after {:?}; abandoning it",
                timeout
            ));
        }
        drained
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<AlertJob>>>,
    player: Arc<dyn AudioPlayer>,
    stats: Arc<DispatchStats>,
) {
    let logger = LogManager::new("alerts");
    loop {
        let next = queue.lock().await.recv().await;
        let Some(AlertJob { label, asset }) = next else {
            break;
        };

        let player = Arc::clone(&player);
        match tokio::task::spawn_blocking(move || player.play(&asset)).await {
            Ok(Ok(())) => {
                stats.played.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                logger.warn(&format!("worker {} alert for {} failed: {}", id, label, err));
            }
            Err(join_err) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                logger.warn(&format!("worker {} alert for {} aborted: {}", id, label, join_err));
            }
        }
    }
}
