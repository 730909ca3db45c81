//! Host-facing facade.
//!
//! [`UsageTracker`] wires the accumulator, store, probe and notification hub
//! together and exposes the three inbound interfaces a host drives:
//! command ingestion, the job-started event, and subscriber connections.

use crate::error::Result;
use crate::models::Snapshot;
use crate::notify::{NotificationHub, NotificationSink, Subscriber, Subscription};
use crate::probe::TemperatureProbe;
use crate::reconciler::{Reconciler, ReconcilerHandle};
use crate::session::SessionAccumulator;
use crate::store::LifetimeStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct UsageTracker {
    session: Arc<SessionAccumulator>,
    store: Arc<dyn LifetimeStore>,
    probe: Arc<dyn TemperatureProbe>,
    hub: Arc<NotificationHub>,
    reconciler: Option<ReconcilerHandle>,
}

impl UsageTracker {
    pub fn new(
        store: Arc<dyn LifetimeStore>,
        probe: Arc<dyn TemperatureProbe>,
        notify_buffer: usize,
    ) -> Self {
        Self {
            session: Arc::new(SessionAccumulator::new()),
            store,
            probe,
            hub: Arc::new(NotificationHub::new(notify_buffer)),
            reconciler: None,
        }
    }

    pub fn session(&self) -> &Arc<SessionAccumulator> {
        &self.session
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Observe one command. Never blocks on I/O.
    ///
    /// The return value is advisory: `true` if the command contributed material.
    pub fn handle_command(&self, raw: &str) -> bool {
        match self.session.handle_command(raw) {
            Ok(delta) => delta.is_some(),
            Err(e) => {
                debug!(error = %e, "Skipping malformed command");
                false
            }
        }
    }

    /// Reset the session and push the new snapshot to every subscriber.
    pub fn on_job_started(&self) {
        self.session.reset_session();
        info!("Job started, session totals reset");

        if let Some(snapshot) = self.current_snapshot() {
            self.hub.publish(&snapshot);
        }
    }

    pub fn subscribe(&self, who: &Subscriber) -> Subscription {
        self.hub.subscribe(who, || self.current_snapshot())
    }

    /// Fresh snapshot from the store's current totals.
    pub fn current_snapshot(&self) -> Option<Snapshot> {
        match self.store.load() {
            Ok(lifetime) => Some(self.session.snapshot(Instant::now(), &lifetime)),
            Err(e) => {
                warn!(error = %e, "Failed to load lifetime stats for snapshot");
                None
            }
        }
    }

    /// Start the reconciliation loop. Requires a Tokio runtime.
    pub fn start(&mut self, period: Duration) -> Result<()> {
        if self.reconciler.is_some() {
            return Ok(());
        }

        let reconciler = Reconciler::new(
            Arc::clone(&self.session),
            Arc::clone(&self.store),
            Arc::clone(&self.probe),
            Arc::clone(&self.hub) as Arc<dyn NotificationSink>,
        )?;
        self.reconciler = Some(ReconcilerHandle::spawn(reconciler, period));
        Ok(())
    }

    /// Stop the loop after its in-flight tick and a final flush.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.reconciler.take() {
            handle.shutdown().await?;
        }
        Ok(())
    }
}
