//! Output formatting for snapshots, lifetime totals and replay summaries.
//!
//! Human-readable output rounds material to whole millimetres and prints
//! durations as `HHh:MMm:SSs`, the way the printer sidebar shows them. JSON
//! output uses the notification field names and reports time in seconds.

use crate::commands::replay::ReplaySummary;
use crate::models::{LifetimeStats, Snapshot};
use colored::Colorize;
use std::time::Duration;

/// Format a duration as `HHh:MMm:SSs`, rounding to the nearest second.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64().round() as u64;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{:02}h:{:02}m:{:02}s", hours, minutes, seconds)
}

pub fn format_material(material: f64) -> String {
    format!("{:.0} mm", material.round())
}

pub fn print_snapshot(snapshot: &Snapshot, json_output: bool) {
    if json_output {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Failed to serialize snapshot: {}", e),
        }
        return;
    }

    println!("{}", "[ BED USAGE ]".bold());
    println!(
        "  {:<22} {:>14}   {:<10} {:>14}",
        "Extruded:".cyan(),
        format_material(snapshot.extruded_material),
        "lifetime:".dimmed(),
        format_material(snapshot.lifetime_extruded_material)
    );
    println!(
        "  {:<22} {:>14}   {:<10} {:>14}",
        "First layer:".cyan(),
        format_material(snapshot.extruded_material_first_layer),
        "lifetime:".dimmed(),
        format_material(snapshot.lifetime_extruded_material_first_layer)
    );
    println!(
        "  {:<22} {:>14}   {:<10} {:>14}",
        "Bed at temperature:".cyan(),
        format_duration(snapshot.time_at_temperature).yellow(),
        "lifetime:".dimmed(),
        format_duration(snapshot.lifetime_time_at_temperature).yellow()
    );
}

pub fn print_lifetime(stats: &LifetimeStats, json_output: bool) {
    if json_output {
        let output = serde_json::json!({ "lifetime": stats });
        println!("{}", output);
        return;
    }

    println!("{}", "[ LIFETIME USAGE ]".bold());
    println!(
        "  {:<22} {}",
        "Extruded:".cyan(),
        format_material(stats.extruded_material).green()
    );
    println!(
        "  {:<22} {}",
        "First layer:".cyan(),
        format_material(stats.extruded_material_first_layer).green()
    );
    println!(
        "  {:<22} {}",
        "Bed at temperature:".cyan(),
        format_duration(stats.time_at_temperature).yellow()
    );
}

pub fn print_replay(summary: &ReplaySummary, json_output: bool) {
    if json_output {
        match serde_json::to_string_pretty(summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize replay summary: {}", e),
        }
        return;
    }

    println!("{}", "[ REPLAY ]".bold());
    println!("  {:<22} {}", "Lines:".cyan(), summary.lines);
    println!("  {:<22} {}", "Extruding moves:".cyan(), summary.extruding_moves);
    if summary.parse_errors > 0 {
        println!(
            "  {:<22} {}",
            "Malformed commands:".cyan(),
            summary.parse_errors.to_string().red()
        );
    }
    println!(
        "  {:<22} {}",
        "Extruded:".cyan(),
        format_material(summary.extruded_material).green()
    );
    println!(
        "  {:<22} {}",
        "First layer:".cyan(),
        format_material(summary.extruded_material_first_layer).green()
    );
    if summary.current_layer == 0 {
        println!(
            "  {}",
            "No layer markers found; material is only counted once layer tracking starts".yellow()
        );
    }
}
