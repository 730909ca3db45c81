//! Bed target temperature sources.
//!
//! The reconciler polls a [`TemperatureProbe`] once per tick; it never
//! subscribes. Two adapters are provided for the standalone binary:
//!
//! - [`StreamTargetProbe`] follows `M140`/`M190` commands seen in the stream
//! - [`FileProbe`] reads the target from a file maintained by another process

use crate::error::ProbeError;
use crate::interpreter::{instruction_code, parse_words};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

pub trait TemperatureProbe: Send + Sync {
    /// Current bed target temperature; zero means the heater is off.
    fn bed_target_temperature(&self) -> Result<f64, ProbeError>;
}

/// Tracks the bed target set by `M140 S<t>` / `M190 S<t>` (or `R<t>`).
#[derive(Debug, Default)]
pub struct StreamTargetProbe {
    target_bits: AtomicU64,
}

impl StreamTargetProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a command; returns the new target if it set one.
    pub fn observe(&self, raw: &str) -> Option<f64> {
        let code = instruction_code(raw)?;
        if !(code.is('M', 140) || code.is('M', 190)) {
            return None;
        }

        let target = parse_words(raw)
            .ok()?
            .into_iter()
            .rev()
            .find(|w| w.letter == 'S' || w.letter == 'R')?
            .value
            .max(0.0);

        self.target_bits.store(target.to_bits(), Ordering::Relaxed);
        Some(target)
    }

    pub fn reset(&self) {
        self.target_bits.store(0f64.to_bits(), Ordering::Relaxed);
    }
}

impl TemperatureProbe for StreamTargetProbe {
    fn bed_target_temperature(&self) -> Result<f64, ProbeError> {
        Ok(f64::from_bits(self.target_bits.load(Ordering::Relaxed)))
    }
}

/// Reads the target from a text file containing a single number.
#[derive(Debug, Clone)]
pub struct FileProbe {
    path: PathBuf,
}

impl FileProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemperatureProbe for FileProbe {
    fn bed_target_temperature(&self) -> Result<f64, ProbeError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ProbeError::Unavailable(format!("{}: {}", self.path.display(), e)))?;

        let trimmed = content.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ProbeError::Malformed(trimmed.to_string())),
        }
    }
}
