//! Offline replay of a G-code file.
//!
//! Runs every line through a fresh session as if a job had just started and
//! reports the material it would have counted. Nothing is written to the
//! lifetime store.

use crate::display;
use crate::models::CoordinateMode;
use crate::probe::StreamTargetProbe;
use crate::session::SessionAccumulator;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub lines: u64,
    pub extruding_moves: u64,
    pub parse_errors: u64,
    pub extruded_material: f64,
    pub extruded_material_first_layer: f64,
    pub coordinate_mode: CoordinateMode,
    pub current_layer: u32,
    pub max_bed_target: f64,
}

/// Interpret `reader` line by line.
pub fn replay_lines<R: BufRead>(reader: R) -> Result<ReplaySummary> {
    let session = SessionAccumulator::new();
    let probe = StreamTargetProbe::new();

    let mut lines = 0u64;
    let mut extruding_moves = 0u64;
    let mut parse_errors = 0u64;
    let mut max_bed_target = 0.0f64;

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        lines += 1;

        if let Some(target) = probe.observe(&line) {
            max_bed_target = max_bed_target.max(target);
        }

        match session.handle_command(&line) {
            Ok(Some(delta)) if !delta.is_zero() => extruding_moves += 1,
            Ok(_) => {}
            Err(e) => {
                debug!(line = index + 1, error = %e, "Skipping malformed command");
                parse_errors += 1;
            }
        }
    }

    session.flush_pending();
    let totals = session.totals();

    Ok(ReplaySummary {
        lines,
        extruding_moves,
        parse_errors,
        extruded_material: totals.extruded_material,
        extruded_material_first_layer: totals.extruded_material_first_layer,
        coordinate_mode: session.coordinate_mode(),
        current_layer: session.current_layer(),
        max_bed_target,
    })
}

pub fn replay_file(path: &Path) -> Result<ReplaySummary> {
    let file =
        File::open(path).with_context(|| format!("Failed to open G-code file: {}", path.display()))?;
    replay_lines(BufReader::new(file))
}

pub fn run_replay(path: &Path, json_output: bool) -> Result<()> {
    info!(file = %path.display(), "Replaying G-code file");
    let summary = replay_file(path)?;
    display::print_replay(&summary, json_output);
    Ok(())
}
