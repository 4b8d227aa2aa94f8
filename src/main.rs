use clap::Parser;
use health_merge::config::{Config, load_dotenv};
use health_merge::error::Result;
use health_merge::health::{HealthMergeSensor, StateHub};
use health_merge::input::mqtt::MqttIntegration;
use health_merge::instance_lock::InstanceLock;
use health_merge::output::{ChannelSink, LogSink, OutputSink};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "health-merge", about = "Merge child health sensors into device health")]
struct Args {
    /// Merge sensor definitions (JSON)
    #[arg(short, long, env = "HEALTH_MERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Only log merged states instead of connecting to MQTT
    #[arg(long)]
    no_mqtt: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_logger();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting health merge");
    let _lock = InstanceLock::acquire()?;

    let config = Config::load(args.config.as_deref())?;
    info!("Configuration loaded:");
    info!("  Merge sensors: {}", config.merge.sensors.len());
    info!("  Watched children: {}", config.merge.watched_ids().len());
    if !args.no_mqtt {
        info!(
            "  MQTT broker: {}:{}",
            config.mqtt.broker_host, config.mqtt.broker_port
        );
    }

    let hub = Arc::new(StateHub::new());

    let mut outputs = None;
    let sink: Arc<dyn OutputSink> = if args.no_mqtt {
        Arc::new(LogSink)
    } else {
        let (sink, rx) = ChannelSink::channel();
        outputs = Some(rx);
        Arc::new(sink)
    };

    // Every sensor is subscribed before any child state can arrive.
    let engine = config.merge.engine();
    let sensors: Vec<Arc<HealthMergeSensor>> = config
        .merge
        .merge_sets()
        .into_iter()
        .map(|set| {
            let sensor = Arc::new(HealthMergeSensor::with_engine(
                set,
                engine.clone(),
                hub.clone(),
                sink.clone(),
            ));
            sensor.attach(hub.clone());
            sensor
        })
        .collect();

    let mqtt_tasks = outputs.map(|outputs| {
        MqttIntegration::new(
            config.mqtt.clone(),
            hub.clone(),
            config.merge.watched_ids(),
            outputs,
        )
        .start()
    });

    info!("Health merge is running with {} sensor(s)", sensors.len());
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    for sensor in &sensors {
        sensor.detach();
    }
    if let Some(tasks) = mqtt_tasks {
        tasks.abort();
    }
    info!("Tracked {} child state(s)", hub.ids().len());

    info!("Health merge stopped");
    Ok(())
}
