//! Periodic reconciliation of in-memory deltas with durable totals.
//!
//! Each tick:
//!
//! 1. takes and clears the pending material from the [`SessionAccumulator`]
//! 2. polls the bed target and drives the Idle/Holding transition
//! 3. persists everything owed to the store in one transaction
//! 4. builds a [`Snapshot`] and publishes it only if it differs from the last one sent
//!
//! Amounts that fail to persist stay in an owed buffer and are retried on the
//! next tick, so the store sees every delta exactly once. Ticks run on a
//! single task and never overlap; a late tick is skipped rather than queued.

use crate::error::Result;
use crate::models::{LifetimeDelta, LifetimeStats, Snapshot};
use crate::notify::NotificationSink;
use crate::probe::TemperatureProbe;
use crate::session::SessionAccumulator;
use crate::store::LifetimeStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    /// Amount written to the store this tick (zero when nothing was owed or the write failed)
    pub persisted: LifetimeDelta,
    /// Amount still owed to the store after this tick
    pub owed: LifetimeDelta,
    /// Whether a snapshot was published
    pub notified: bool,
}

pub struct Reconciler {
    session: Arc<SessionAccumulator>,
    store: Arc<dyn LifetimeStore>,
    probe: Arc<dyn TemperatureProbe>,
    sink: Arc<dyn NotificationSink>,
    lifetime: LifetimeStats,
    owed: LifetimeDelta,
    last_sent: Option<Snapshot>,
    probe_failing: bool,
}

impl Reconciler {
    /// Create a reconciler, loading the current lifetime totals.
    pub fn new(
        session: Arc<SessionAccumulator>,
        store: Arc<dyn LifetimeStore>,
        probe: Arc<dyn TemperatureProbe>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let lifetime = store.load()?;

        Ok(Self {
            session,
            store,
            probe,
            sink,
            lifetime,
            owed: LifetimeDelta::default(),
            last_sent: None,
            probe_failing: false,
        })
    }

    /// Lifetime totals as of the last successful write.
    pub fn lifetime(&self) -> LifetimeStats {
        self.lifetime
    }

    pub fn owed(&self) -> LifetimeDelta {
        self.owed
    }

    pub fn last_sent(&self) -> Option<Snapshot> {
        self.last_sent
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        self.owed += LifetimeDelta::from(self.session.flush_pending());
        self.poll_temperature(now);

        let persisted = self.persist_owed();

        // Lifetime totals in a snapshot include amounts not yet persisted
        let credited = self.lifetime.with_delta(&self.owed);
        let snapshot = self.session.snapshot(now, &credited);
        let notified = self.last_sent != Some(snapshot);
        if notified {
            self.sink.publish(&snapshot);
            self.last_sent = Some(snapshot);
        }

        TickReport {
            persisted,
            owed: self.owed,
            notified,
        }
    }

    fn poll_temperature(&mut self, now: Instant) {
        match self.probe.bed_target_temperature() {
            Ok(target) => {
                if self.probe_failing {
                    info!("Temperature source recovered");
                    self.probe_failing = false;
                }

                if target != 0.0 {
                    if self.session.begin_temperature_hold(now) {
                        debug!(target, "Bed hold started");
                    }
                } else if let Some(held) = self.session.end_temperature_hold(now) {
                    debug!(held_secs = held.as_secs_f64(), "Bed hold ended");
                    self.owed.time_at_temperature += held;
                }
            }
            Err(e) => {
                let discarded = self.session.abort_temperature_hold(now);
                if !self.probe_failing {
                    warn!(
                        error = %e,
                        discarded_secs = discarded.map(|d| d.as_secs_f64()),
                        "Temperature source unavailable, hold time is not credited"
                    );
                    self.probe_failing = true;
                }
            }
        }
    }

    fn persist_owed(&mut self) -> LifetimeDelta {
        if self.owed.is_empty() {
            return LifetimeDelta::default();
        }

        match self.store.add(&self.owed) {
            Ok(stats) => {
                self.lifetime = stats;
                std::mem::take(&mut self.owed)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    owed_material = self.owed.material,
                    "Failed to persist lifetime stats, will retry next tick"
                );
                LifetimeDelta::default()
            }
        }
    }
}

/// Handle to a running reconciliation loop.
pub struct ReconcilerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<Reconciler>>,
}

impl ReconcilerHandle {
    /// Start ticking every `period`. The first tick runs immediately.
    ///
    /// Each tick runs on the blocking pool since it writes to the store.
    pub fn spawn(mut reconciler: Reconciler, period: Duration) -> Self {
        let (stop, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut interval = time::interval(period.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_ms = period.as_millis() as u64, "Reconciler started");

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        reconciler = tick_blocking(reconciler).await?;
                    }
                }
            }

            reconciler = tick_blocking(reconciler).await?;
            info!("Reconciler stopped");
            Ok::<_, anyhow::Error>(reconciler)
        });

        Self { stop, task }
    }

    /// Stop after the in-flight tick and one final flush, returning the reconciler.
    pub async fn shutdown(self) -> anyhow::Result<Reconciler> {
        let _ = self.stop.send(());
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Reconciler task failed");
                Err(anyhow::anyhow!("Reconciler task failed: {}", e))
            }
        }
    }
}

async fn tick_blocking(mut reconciler: Reconciler) -> anyhow::Result<Reconciler> {
    task::spawn_blocking(move || {
        reconciler.tick();
        reconciler
    })
    .await
    .map_err(|e| {
        error!(error = %e, "Reconciler tick panicked");
        anyhow::anyhow!("Reconciler tick panicked: {}", e)
    })
}
