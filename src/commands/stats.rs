//! Print the durable lifetime totals.

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;
use crate::display;
use crate::store::StatsStore;

pub fn run_stats(config: &Config, json_output: bool) -> Result<()> {
    let db_path = config.paths.database_path();
    let store = StatsStore::open(&db_path)
        .with_context(|| format!("Failed to open stats database: {}", db_path.display()))?;

    let stats = store.load().context("Failed to load lifetime stats")?;
    debug!(
        database = %db_path.display(),
        schema_version = ?store.schema_version().ok(),
        "Loaded lifetime stats"
    );

    display::print_lifetime(&stats, json_output);
    Ok(())
}
