//! Evaluate merge sensors against a static state snapshot.
//!
//! Usage:
//!   cargo run --bin merge-check -- --config sets.json --states states.json
//!
//! Prints the record each merge sensor would publish, one JSON line per set.

use clap::Parser;
use health_merge::config::MergeConfig;
use health_merge::error::Result;
use health_merge::health::HealthMergeSensor;
use health_merge::input::snapshot::SnapshotStore;
use health_merge::output::{ExposedState, LogSink};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "merge-check", about = "Evaluate merge sensors against a state snapshot")]
struct Args {
    /// Merge sensor definitions (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Child state snapshot (JSON)
    #[arg(short, long)]
    states: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let merge = MergeConfig::load(&args.config)?;
    let store = Arc::new(SnapshotStore::load(&args.states)?);
    info!("Loaded {} child state(s)", store.len());

    let engine = merge.engine();
    for set in merge.merge_sets() {
        let sensor =
            HealthMergeSensor::with_engine(set, engine.clone(), store.clone(), Arc::new(LogSink));
        let output = sensor.update();
        let record = ExposedState::new(sensor.merge_set(), &output);
        println!(
            "{}",
            serde_json::json!({ "id": sensor.merge_set().id(), "record": record })
        );
    }
    Ok(())
}
