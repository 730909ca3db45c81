//! Durable lifetime stats on SQLite.
//!
//! The database holds a single `stats` row and a `schema_version` row. On
//! open the version decides what happens:
//!
//! - **unset**: create the schema at the current version with all-zero stats
//! - **older**: run migration steps one version at a time, each in its own
//!   transaction that also bumps the stored version
//! - **newer**: refuse with [`BedUsageError::SchemaTooNew`]
//!
//! Every mutator runs in one transaction and returns the totals read back
//! inside that transaction, so a caller never sees a half-applied update.

use crate::error::{BedUsageError, Result};
use crate::models::{duration_from_secs, LifetimeDelta, LifetimeStats};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Persistence seam used by the reconciler.
pub trait LifetimeStore: Send + Sync {
    fn load(&self) -> Result<LifetimeStats>;

    /// Add all fields of `delta` atomically and return the new totals.
    fn add(&self, delta: &LifetimeDelta) -> Result<LifetimeStats>;
}

type MigrationFn = fn(&Transaction<'_>) -> rusqlite::Result<()>;

/// Transforms the stored representation from `from` to `from + 1`.
#[derive(Clone, Copy)]
pub(crate) struct MigrationStep {
    pub from: u32,
    pub description: &'static str,
    pub apply: MigrationFn,
}

const MIGRATIONS: &[MigrationStep] = &[];

const CREATE_STATS: &str = "
CREATE TABLE IF NOT EXISTS stats (
    extruded_material REAL NOT NULL DEFAULT 0,
    extruded_material_first_layer REAL NOT NULL DEFAULT 0,
    time_at_temperature REAL NOT NULL DEFAULT 0
)";

pub struct StatsStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl StatsStore {
    /// Open or create the stats database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;

        Self::with_connection(conn, Some(path.to_path_buf()), CURRENT_SCHEMA_VERSION, MIGRATIONS)
    }

    /// Private in-memory store, used for offline replays and tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, None, CURRENT_SCHEMA_VERSION, MIGRATIONS)
    }

    pub(crate) fn with_connection(
        mut conn: Connection,
        path: Option<PathBuf>,
        current: u32,
        steps: &[MigrationStep],
    ) -> Result<Self> {
        prepare_schema(&mut conn, current, steps)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn.lock();
        Ok(read_version(&conn)?.unwrap_or(0))
    }

    pub fn load(&self) -> Result<LifetimeStats> {
        let conn = self.conn.lock();
        Ok(read_stats(&conn)?)
    }

    pub fn add(&self, delta: &LifetimeDelta) -> Result<LifetimeStats> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE stats SET
                extruded_material = extruded_material + ?1,
                extruded_material_first_layer = extruded_material_first_layer + ?2,
                time_at_temperature = time_at_temperature + ?3",
            params![
                delta.material,
                delta.first_layer_material,
                delta.time_at_temperature.as_secs_f64()
            ],
        )?;
        let stats = read_stats(&tx)?;
        tx.commit()?;

        debug!(
            material = delta.material,
            first_layer_material = delta.first_layer_material,
            time_at_temperature_secs = delta.time_at_temperature.as_secs_f64(),
            "Persisted lifetime delta"
        );
        Ok(stats)
    }

    pub fn add_material(&self, delta: f64) -> Result<LifetimeStats> {
        self.add(&LifetimeDelta {
            material: delta,
            ..Default::default()
        })
    }

    pub fn add_first_layer_material(&self, delta: f64) -> Result<LifetimeStats> {
        self.add(&LifetimeDelta {
            first_layer_material: delta,
            ..Default::default()
        })
    }

    pub fn add_time_at_temperature(&self, delta: Duration) -> Result<LifetimeStats> {
        self.add(&LifetimeDelta {
            time_at_temperature: delta,
            ..Default::default()
        })
    }
}

impl LifetimeStore for StatsStore {
    fn load(&self) -> Result<LifetimeStats> {
        StatsStore::load(self)
    }

    fn add(&self, delta: &LifetimeDelta) -> Result<LifetimeStats> {
        StatsStore::add(self, delta)
    }
}

fn prepare_schema(conn: &mut Connection, current: u32, steps: &[MigrationStep]) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    match read_version(conn)? {
        None | Some(0) => {
            let tx = conn.transaction()?;
            tx.execute(CREATE_STATS, [])?;
            let rows: i64 = tx.query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))?;
            if rows == 0 {
                tx.execute("INSERT INTO stats VALUES (0, 0, 0)", [])?;
            }
            write_version(&tx, current)?;
            tx.commit()?;
            info!(version = current, "Initialized lifetime stats schema");
        }
        Some(found) if found > current => {
            return Err(BedUsageError::SchemaTooNew {
                found,
                supported: current,
            });
        }
        Some(found) if found < current => migrate(conn, found, current, steps)?,
        Some(_) => {}
    }

    Ok(())
}

fn migrate(conn: &mut Connection, from: u32, to: u32, steps: &[MigrationStep]) -> Result<()> {
    info!(from, to, "Migrating lifetime stats schema");

    for version in from..to {
        let tx = conn.transaction()?;
        match steps.iter().find(|step| step.from == version) {
            Some(step) => {
                debug!(from = version, description = step.description, "Applying migration step");
                (step.apply)(&tx)?;
            }
            None => debug!(from = version, "No transformation needed for this version"),
        }
        write_version(&tx, version + 1)?;
        tx.commit()?;
    }

    Ok(())
}

fn read_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()
}

fn write_version(tx: &Transaction<'_>, version: u32) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", params![version])?;
    Ok(())
}

fn read_stats(conn: &Connection) -> rusqlite::Result<LifetimeStats> {
    conn.query_row(
        "SELECT extruded_material, extruded_material_first_layer, time_at_temperature
         FROM stats LIMIT 1",
        [],
        |row| {
            Ok(LifetimeStats {
                extruded_material: row.get(0)?,
                extruded_material_first_layer: row.get(1)?,
                time_at_temperature: duration_from_secs(row.get(2)?),
            })
        },
    )
}
