use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use bed_usage::commands::{self, WatchOptions};
use bed_usage::config::{self, Config};
use bed_usage::logging;

#[derive(Parser)]
#[command(name = "bed-usage")]
#[command(about = "Track filament and heated-bed usage from a printer's G-code stream")]
#[command(version)]
struct Cli {
    /// Use this config file instead of the default search path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a command stream and publish usage snapshots
    Watch {
        /// Read commands from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
        /// Do not treat the start of the stream as a new job
        #[arg(long)]
        no_job_start: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Interpret a G-code file offline without touching lifetime stats
    Replay {
        /// G-code file to interpret
        file: PathBuf,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show lifetime stats
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn json(&self) -> bool {
        match self {
            Commands::Watch { json, .. } | Commands::Replay { json, .. } | Commands::Stats { json } => *json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.command.json();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return handle_error(e, json),
    };
    config::init_config(config);
    let config = config::get_config();

    let _log_guard = logging::init_logging(&config.logging, &config.paths.log_directory);

    let outcome = match cli.command {
        Commands::Watch {
            input,
            no_job_start,
            json,
        } => {
            let options = WatchOptions {
                input,
                announce_job_start: !no_job_start,
                json_output: json,
            };
            commands::run_watch(config, options).await
        }
        Commands::Replay { file, json } => commands::run_replay(&file, json),
        Commands::Stats { json } => commands::run_stats(config, json),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

fn resolve_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from_file(path)?;
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
        None => Config::load(),
    }
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
