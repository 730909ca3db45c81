#![allow(dead_code)]

use bed_usage::error::{BedUsageError, Result};
use bed_usage::{
    LifetimeDelta, LifetimeStats, LifetimeStore, NotificationSink, ProbeError, Reconciler,
    SessionAccumulator, Snapshot, StatsStore, TemperatureProbe,
};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn write_gcode(dir: &Path, filename: &str, content: &str) -> PathBuf {
    let path = dir.join(filename);
    fs::write(&path, content).unwrap();
    path
}

/// In-memory store that can be told to fail writes.
pub struct FlakyStore {
    inner: StatsStore,
    failing: AtomicBool,
    attempts: AtomicUsize,
    write_delay: Mutex<Duration>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: StatsStore::open_in_memory().unwrap(),
            failing: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            write_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every write block the calling thread for `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl LifetimeStore for FlakyStore {
    fn load(&self) -> Result<LifetimeStats> {
        self.inner.load()
    }

    fn add(&self, delta: &LifetimeDelta) -> Result<LifetimeStats> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BedUsageError::StoreIo(rusqlite::Error::InvalidQuery));
        }
        self.inner.add(delta)
    }
}

/// Probe whose answer is set by the test.
pub struct ScriptedProbe {
    reading: Mutex<std::result::Result<f64, ProbeError>>,
}

impl ScriptedProbe {
    pub fn new(target: f64) -> Self {
        Self {
            reading: Mutex::new(Ok(target)),
        }
    }

    pub fn set_target(&self, target: f64) {
        *self.reading.lock() = Ok(target);
    }

    pub fn fail(&self) {
        *self.reading.lock() = Err(ProbeError::Unavailable("sensor offline".to_string()));
    }
}

impl TemperatureProbe for ScriptedProbe {
    fn bed_target_temperature(&self) -> std::result::Result<f64, ProbeError> {
        self.reading.lock().clone()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<Snapshot>>,
}

impl RecordingSink {
    pub fn published(&self) -> Vec<Snapshot> {
        self.published.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, snapshot: &Snapshot) {
        self.published.lock().push(*snapshot);
    }
}

pub struct Harness {
    pub session: Arc<SessionAccumulator>,
    pub store: Arc<FlakyStore>,
    pub probe: Arc<ScriptedProbe>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            session: Arc::new(SessionAccumulator::new()),
            store: Arc::new(FlakyStore::new()),
            probe: Arc::new(ScriptedProbe::new(0.0)),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.session),
            Arc::clone(&self.store) as Arc<dyn LifetimeStore>,
            Arc::clone(&self.probe) as Arc<dyn TemperatureProbe>,
            Arc::clone(&self.sink) as Arc<dyn NotificationSink>,
        )
        .unwrap()
    }

    /// Feed each line to the session, panicking on malformed input.
    pub fn feed(&self, lines: &[&str]) {
        for line in lines {
            self.session.handle_command(line).unwrap();
        }
    }
}
