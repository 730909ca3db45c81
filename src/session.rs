//! Session accumulator shared by the ingestion path and the reconciler.
//!
//! All mutable session state sits behind one mutex so that interpreting a
//! command and adding its delta to the pending counters happen as one step,
//! and so that the reconciler's take-and-clear of pending material can never
//! interleave with an ingestion update. The lock is held only for in-memory
//! arithmetic; nothing here touches the store or the probe.

use crate::error::CommandParseError;
use crate::interpreter::CommandInterpreter;
use crate::models::{CoordinateMode, LifetimeStats, MaterialDelta, Snapshot};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Heated-bed hold state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldState {
    #[default]
    Idle,
    Holding { since: Instant },
}

impl HoldState {
    fn elapsed(&self, now: Instant) -> Duration {
        match self {
            HoldState::Idle => Duration::ZERO,
            HoldState::Holding { since } => now.saturating_duration_since(*since),
        }
    }
}

/// Session material totals as of the last flush.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionTotals {
    pub extruded_material: f64,
    pub extruded_material_first_layer: f64,
}

#[derive(Debug, Default)]
struct SessionState {
    totals: SessionTotals,
    pending: MaterialDelta,
    interpreter: CommandInterpreter,
    hold: HoldState,
}

impl SessionState {
    fn cumulative_material(&self) -> f64 {
        self.totals.extruded_material + self.pending.material
    }
}

#[derive(Debug, Default)]
pub struct SessionAccumulator {
    state: Mutex<SessionState>,
}

impl SessionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret a command and buffer any delta it produces.
    ///
    /// Malformed motion commands are returned as errors and leave the
    /// pending counters untouched.
    pub fn handle_command(&self, raw: &str) -> Result<Option<MaterialDelta>, CommandParseError> {
        let mut state = self.state.lock();
        let cumulative = state.cumulative_material();
        let delta = state.interpreter.process(raw, cumulative)?;

        if let Some(delta) = delta {
            state.pending += delta;
        }
        Ok(delta)
    }

    /// Add a delta to the pending counters.
    pub fn apply(&self, delta: MaterialDelta) {
        self.state.lock().pending += delta;
    }

    /// Take and clear the pending counters, folding them into the session totals.
    ///
    /// The returned amount is what the caller must persist; it is handed out
    /// exactly once.
    pub fn flush_pending(&self) -> MaterialDelta {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        state.totals.extruded_material += pending.material;
        state.totals.extruded_material_first_layer += pending.first_layer;
        pending
    }

    pub fn pending(&self) -> MaterialDelta {
        self.state.lock().pending
    }

    pub fn totals(&self) -> SessionTotals {
        self.state.lock().totals
    }

    pub fn coordinate_mode(&self) -> CoordinateMode {
        self.state.lock().interpreter.coordinate_mode()
    }

    pub fn current_layer(&self) -> u32 {
        self.state.lock().interpreter.current_layer()
    }

    /// Zero the session totals and forget layer and mode.
    ///
    /// Pending material is kept so it still reaches the store on the next flush.
    pub fn reset_session(&self) {
        let mut state = self.state.lock();
        state.totals = SessionTotals::default();
        state.interpreter.on_job_start();
    }

    pub fn hold_state(&self) -> HoldState {
        self.state.lock().hold
    }

    /// Enter `Holding` if idle. Returns whether a transition happened.
    pub fn begin_temperature_hold(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        match state.hold {
            HoldState::Idle => {
                state.hold = HoldState::Holding { since: now };
                true
            }
            HoldState::Holding { .. } => false,
        }
    }

    /// Leave `Holding`, returning the time held. `None` if already idle.
    pub fn end_temperature_hold(&self, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock();
        let held = match state.hold {
            HoldState::Idle => return None,
            hold @ HoldState::Holding { .. } => hold.elapsed(now),
        };
        state.hold = HoldState::Idle;
        Some(held)
    }

    /// Force `Idle` without crediting the hold. Returns the discarded time.
    pub fn abort_temperature_hold(&self, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock();
        let discarded = match state.hold {
            HoldState::Idle => return None,
            hold @ HoldState::Holding { .. } => hold.elapsed(now),
        };
        state.hold = HoldState::Idle;
        Some(discarded)
    }

    /// Build a snapshot from the session totals and the given lifetime totals,
    /// including the live hold time if currently holding.
    pub fn snapshot(&self, now: Instant, lifetime: &LifetimeStats) -> Snapshot {
        let state = self.state.lock();
        let live_hold = state.hold.elapsed(now);

        Snapshot {
            extruded_material: state.totals.extruded_material,
            extruded_material_first_layer: state.totals.extruded_material_first_layer,
            lifetime_extruded_material: lifetime.extruded_material,
            lifetime_extruded_material_first_layer: lifetime.extruded_material_first_layer,
            time_at_temperature: live_hold,
            lifetime_time_at_temperature: lifetime.time_at_temperature + live_hold,
        }
    }
}
