//! # homewired — homewire daemon
//!
//! Composition root that wires the protocol components to a substrate.
//!
//! ## Modes
//! - `simulate`: one MQTT connection and device agent per configured device
//! - `watch`: controller endpoint printing every status update as JSON
//! - `send`: fire-and-forget command to one device
//! - `demo`: agents, controller and a scripted command sequence over the
//!   in-memory broker
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no protocol logic belongs here.

mod config;

use std::collections::HashSet;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use homewire_adapter_memory::MemoryBroker;
use homewire_adapter_mqtt::MqttTransport;
use homewire_app::agent::DeviceAgent;
use homewire_app::controller::Controller;
use homewire_app::dispatcher::CommandDispatcher;
use homewire_domain::command::Command;
use homewire_domain::id::{DeviceId, DeviceIdentity, DeviceKind};
use homewire_domain::status::StatusMessage;

use crate::config::Config;

const DEFAULT_FILTER: &str = "homewired=info,homewire=info";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
const DEMO_STARTUP_TIMEOUT: Duration = Duration::from_secs(2);
const DEMO_STEP_TIMEOUT: Duration = Duration::from_millis(250);

/// homewire smart-home protocol daemon
#[derive(Parser, Debug)]
#[command(name = "homewired", version)]
#[command(about = "Simulate, watch and control homewire devices", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = config::DEFAULT_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run a device agent for every configured device
    Simulate,
    /// Print every status update as one JSON line
    Watch,
    /// Send one command and exit
    Send {
        /// Device type (`light` or `fan`)
        kind: DeviceKind,
        /// Device id
        id: DeviceId,
        /// Command action, e.g. `set_brightness`
        action: String,
        /// Command value; parsed as JSON, otherwise sent as a string
        value: String,
    },
    /// Run agents, a controller and a scripted sequence in-process
    Demo,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    init_tracing(&config.logging.filter);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_topic = %config.topics().base(),
        "homewired starting"
    );

    match cli.mode {
        Mode::Simulate => simulate(&config).await,
        Mode::Watch => watch(&config).await,
        Mode::Send {
            kind,
            id,
            action,
            value,
        } => {
            let target = DeviceIdentity::new(kind, id);
            send(&config, &target, &Command::new(action, parse_value(&value))).await
        }
        Mode::Demo => demo(&config).await,
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?} ({err}), using {DEFAULT_FILTER}");
        EnvFilter::new(DEFAULT_FILTER)
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn simulate(config: &Config) -> Result<(), Box<dyn Error>> {
    let topics = config.topics();
    let mut transports = Vec::new();
    let mut agents = Vec::new();

    for device in config.devices() {
        let (id, state) = device.build()?;
        let client_id = client_id(&format!("{}-{id}", device.kind));
        let (transport, events) = MqttTransport::connect(&config.broker, client_id).await?;
        let transport = Arc::new(transport);

        let agent = DeviceAgent::new(id, state, &topics, Arc::clone(&transport));
        tracing::info!(device = %agent.identity(), "device agent started");
        agents.push(tokio::spawn(agent.run(events)));
        transports.push(transport);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    for transport in &transports {
        transport.shutdown(SHUTDOWN_TIMEOUT).await;
    }
    for agent in agents {
        let state = agent.await?;
        tracing::debug!(?state, "device agent stopped");
    }
    Ok(())
}

async fn watch(config: &Config) -> Result<(), Box<dyn Error>> {
    let client_id = client_id(&format!("{}-watch", config.broker.client_prefix));
    let (transport, events) = MqttTransport::connect(&config.broker, client_id).await?;

    let controller = Controller::new(config.topics(), transport);
    let mut feed = controller.aggregator().subscribe();
    let transport = controller.transport();
    let runner = tokio::spawn(controller.run(events));

    loop {
        tokio::select! {
            update = feed.recv() => match update {
                Ok(status) => println!("{}", serde_json::to_string(&status)?),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watcher fell behind, statuses skipped");
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    transport.shutdown(SHUTDOWN_TIMEOUT).await;
    runner.await?;
    Ok(())
}

async fn send(
    config: &Config,
    target: &DeviceIdentity,
    command: &Command,
) -> Result<(), Box<dyn Error>> {
    let client_id = client_id(&format!("{}-send", config.broker.client_prefix));
    // The stream must outlive the flush, the driver stops once it is dropped.
    let (transport, _events) = MqttTransport::connect(&config.broker, client_id).await?;
    let transport = Arc::new(transport);

    CommandDispatcher::new(config.topics(), Arc::clone(&transport))
        .dispatch(target, command)
        .await?;

    transport.shutdown(SHUTDOWN_TIMEOUT).await;
    Ok(())
}

async fn demo(config: &Config) -> Result<(), Box<dyn Error>> {
    let topics = config.topics();
    let broker = MemoryBroker::new();

    let mut expected = HashSet::new();
    let mut agents = Vec::new();
    for device in config.devices() {
        let (id, state) = device.build()?;
        let (client, events) = broker.connect(client_id(&format!("{}-{id}", device.kind)));
        let agent = DeviceAgent::new(id, state, &topics, client);
        expected.insert(agent.identity().clone());
        agents.push(tokio::spawn(agent.run(events)));
    }

    let (client, events) = broker.connect(client_id("demo-controller"));
    let controller = Controller::new(topics, client);
    let aggregator = controller.aggregator();
    let dispatcher = controller.dispatcher();
    let mut feed = aggregator.subscribe();
    let runner = tokio::spawn(controller.run(events));

    if tokio::time::timeout(DEMO_STARTUP_TIMEOUT, wait_for_devices(&mut feed, &expected))
        .await
        .is_err()
    {
        tracing::warn!("not every device reported in time");
    }

    let mut devices: Vec<DeviceIdentity> = expected.into_iter().collect();
    devices.sort();
    for target in &devices {
        for command in script(target.kind) {
            dispatcher.dispatch(target, &command).await?;
            let outcome = tokio::time::timeout(DEMO_STEP_TIMEOUT, next_status(&mut feed, target))
                .await
                .ok()
                .flatten();
            let result = match outcome {
                Some(status) => serde_json::to_string(&status)?,
                None => "no status (command rejected)".to_string(),
            };
            println!("{target} {} {} -> {result}", command.action, command.value);
        }
    }

    println!("final statuses:");
    for status in aggregator.all_latest() {
        println!("{}", serde_json::to_string(&status)?);
    }

    broker.shutdown();
    runner.await?;
    for agent in agents {
        agent.await?;
    }
    Ok(())
}

fn script(kind: DeviceKind) -> Vec<Command> {
    match kind {
        DeviceKind::Light => vec![
            Command::set_state(true),
            Command::set_brightness(35),
            Command::set_speed(2),
            Command::set_state(false),
        ],
        DeviceKind::Fan => vec![
            Command::set_speed(3),
            Command::set_brightness(50),
            Command::set_speed(0),
        ],
    }
}

/// Wait until the feed delivered a status from every device in `expected`,
/// then discard whatever else is queued so later reads see fresh statuses.
async fn wait_for_devices(
    feed: &mut broadcast::Receiver<StatusMessage>,
    expected: &HashSet<DeviceIdentity>,
) {
    let mut pending = expected.clone();
    while !pending.is_empty() {
        match feed.recv().await {
            Ok(status) => {
                pending.remove(&status.identity());
            }
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return,
        }
    }
    while feed.try_recv().is_ok() {}
}

async fn next_status(
    feed: &mut broadcast::Receiver<StatusMessage>,
    target: &DeviceIdentity,
) -> Option<StatusMessage> {
    loop {
        match feed.recv().await {
            Ok(status) if status.identity() == *target => return Some(status),
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return None,
        }
    }
}

/// `<prefix>-<6 hex chars>`, unique per process run.
fn client_id(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..6])
}

/// JSON when it parses, a plain string otherwise.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}
