//! Watch command implementation
//!
//! Feeds a live command stream (stdin or a file) through a [`UsageTracker`]
//! backed by the configured store and temperature source, printing each
//! snapshot the reconciler publishes until the stream ends or Ctrl+C.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info};

use crate::config::{Config, ProbeSource};
use crate::display;
use crate::notify::Subscriber;
use crate::probe::{FileProbe, StreamTargetProbe, TemperatureProbe};
use crate::service::UsageTracker;
use crate::store::StatsStore;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Read commands from this file instead of stdin
    pub input: Option<PathBuf>,
    /// Treat the start of the stream as a new job
    pub announce_job_start: bool,
    pub json_output: bool,
}

pub async fn run_watch(config: &Config, options: WatchOptions) -> Result<()> {
    let db_path = config.paths.database_path();
    let store = Arc::new(
        StatsStore::open(&db_path)
            .with_context(|| format!("Failed to open stats database: {}", db_path.display()))?,
    );

    let stream_probe = Arc::new(StreamTargetProbe::new());
    let probe: Arc<dyn TemperatureProbe> = match config.probe.source {
        ProbeSource::Stream => Arc::clone(&stream_probe) as Arc<dyn TemperatureProbe>,
        ProbeSource::File => {
            let path = config
                .probe
                .file
                .clone()
                .context("Probe source 'file' requires probe.file to be set")?;
            Arc::new(FileProbe::new(path))
        }
    };
    let follow_stream = config.probe.source == ProbeSource::Stream;

    let mut tracker = UsageTracker::new(store, probe, config.notify.channel_buffer);
    let mut subscription = tracker.subscribe(&Subscriber::User("cli".to_string()));

    let json_output = options.json_output;
    let printer = tokio::spawn(async move {
        while let Some(snapshot) = subscription.recv().await {
            display::print_snapshot(&snapshot, json_output);
        }
    });

    tracker.start(config.reconciler.tick_interval())?;
    info!(
        database = %db_path.display(),
        probe = ?config.probe.source,
        "Watching command stream"
    );

    if options.announce_job_start {
        tracker.on_job_started();
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &options.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input: {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let outcome = pump_lines(reader, &tracker, follow_stream.then_some(&*stream_probe)).await;

    tracker.shutdown().await?;
    drop(tracker);

    if let Err(e) = printer.await {
        error!(error = %e, "Snapshot printer task failed");
    }

    outcome
}

async fn pump_lines(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    tracker: &UsageTracker,
    stream_probe: Option<&StreamTargetProbe>,
) -> Result<()> {
    let mut lines = reader.lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut count = 0u64;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read command stream")? else {
                    info!(lines = count, "Command stream ended");
                    break;
                };
                count += 1;

                if let Some(probe) = stream_probe {
                    probe.observe(&line);
                }
                tracker.handle_command(&line);
            }
            _ = &mut ctrl_c => {
                info!(lines = count, "Interrupted, flushing and stopping");
                break;
            }
        }
    }

    Ok(())
}
