//! Periodic sweep of pending link checks.
//!
//! Each tick reads every pending entry once and spawns one fetch per entry
//! without waiting for it. Fetch outcomes go through the [`Correlator`].
//!
//! ### Re-entrancy
//! - A tick that arrives while a sweep is running is skipped.
//! - Entries whose fetch is still outstanding are tracked in memory and
//!   never issued twice.
//! - An entry resolved between the pending snapshot and its issue is
//!   skipped.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use linkpeek_core::{EntryStatus, Error};
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::correlate::Correlator;
use crate::fetch::{Fetcher, normalize};
use crate::queue::LinkQueue;

/// Default cap on simultaneous outbound requests.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sweeping,
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Pending entries seen.
    pub pending: usize,
    /// Fetches spawned.
    pub issued: usize,
    /// Entries skipped because their previous fetch is outstanding.
    pub in_flight: usize,
    /// Entries marked `error` for an unusable URL.
    pub invalid: usize,
}

pub struct Scheduler {
    queue: LinkQueue,
    fetcher: Arc<dyn Fetcher>,
    correlator: Arc<Correlator>,
    interval: Duration,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    tasks: Mutex<JoinSet<()>>,
    sweeping: AtomicBool,
}

impl Scheduler {
    pub fn new(queue: LinkQueue, fetcher: Arc<dyn Fetcher>, correlator: Arc<Correlator>, interval: Duration) -> Self {
        Self {
            queue,
            fetcher,
            correlator,
            interval,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tasks: Mutex::new(JoinSet::new()),
            sweeping: AtomicBool::new(false),
        }
    }

    /// Limit simultaneous requests. Spawning is never blocked by the limit.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn state(&self) -> SchedulerState {
        if self.sweeping.load(Ordering::Acquire) { SchedulerState::Sweeping } else { SchedulerState::Idle }
    }

    /// Number of issued fetches whose outcome has not been correlated yet.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Run one sweep.
    ///
    /// Returns once every fetch has been spawned, not when they finish.
    pub async fn sweep(&self) -> Result<SweepReport, Error> {
        if self.sweeping.swap(true, Ordering::AcqRel) {
            tracing::debug!("sweep already running, skipping tick");
            return Ok(SweepReport::default());
        }

        let result = self.sweep_pending().await;
        self.sweeping.store(false, Ordering::Release);
        result
    }

    async fn sweep_pending(&self) -> Result<SweepReport, Error> {
        let pending = self.queue.list_pending().await?;
        let mut report = SweepReport { pending: pending.len(), ..Default::default() };

        let mut tasks = self.tasks.lock().await;
        while tasks.try_join_next().is_some() {}

        for entry in pending {
            let url = match normalize(&entry.target_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(id = %entry.id, url = %entry.target_url, error = %e, "unusable target url");
                    self.queue.resolve(&entry, EntryStatus::Error, None).await?;
                    report.invalid += 1;
                    continue;
                }
            };

            if !self.in_flight.lock().await.insert(entry.id.clone()) {
                report.in_flight += 1;
                continue;
            }

            let still_pending = match self.queue.get_by_id(&entry.id).await {
                Ok(current) => current.is_some_and(|e| e.is_pending()),
                Err(e) => {
                    self.in_flight.lock().await.remove(&entry.id);
                    return Err(e);
                }
            };
            if !still_pending {
                tracing::debug!(id = %entry.id, "entry resolved since snapshot, not issuing");
                self.in_flight.lock().await.remove(&entry.id);
                continue;
            }

            let id = entry.id;
            let fetcher = Arc::clone(&self.fetcher);
            let correlator = Arc::clone(&self.correlator);
            let in_flight = Arc::clone(&self.in_flight);
            let permits = Arc::clone(&self.permits);

            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => fetcher.fetch(&url).await,
                    Err(e) => Err(Error::Transport(format!("fetch limiter closed: {e}"))),
                };

                match correlator.handle(url.as_str(), &outcome).await {
                    Ok(correlation) => tracing::debug!(%id, ?correlation, "fetch correlated"),
                    Err(e) if e.is_storage() => tracing::error!(%id, error = %e, "failed to record fetch outcome"),
                    Err(e) => tracing::warn!(%id, error = %e, "listener rejected fetch outcome"),
                }

                in_flight.lock().await.remove(&id);
            });
            report.issued += 1;
        }
        drop(tasks);

        let purged = self.queue.purge_expired().await?;
        tracing::info!(
            pending = report.pending,
            issued = report.issued,
            in_flight = report.in_flight,
            invalid = report.invalid,
            purged,
            "link sweep finished"
        );

        Ok(report)
    }

    /// Wait for every spawned fetch to finish.
    pub async fn settle(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "fetch task panicked or was cancelled");
            }
        }
    }

    /// Sweep on every interval tick until `shutdown` turns true or its
    /// sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_secs = self.interval.as_secs(), "link scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "link sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("link scheduler stopped");
    }
}
