// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! HomeGuard - home-automation controller
//!
//! Subscribes to the sensor nodes over MQTT (or a simulated node in demo
//! mode), runs occupancy and alarm logic and drives the buzzer and lights.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use homeguard::{
    Config, Controller, Database, DemoNode, EventBus, EventSource, HistoryStore, MqttClient,
    Scheduler, StreamingManager, VERSION,
};

/// HomeGuard - home-automation controller
#[derive(Parser, Debug)]
#[command(name = "homeguard")]
#[command(author = "HomeGuard Project")]
#[command(version = VERSION)]
#[command(about = "Sensor aggregation, occupancy inference and alarm control")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with a simulated sensor node
    #[arg(long)]
    demo: bool,

    /// MQTT broker address
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// Data output directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("HomeGuard v{} - home-automation controller", VERSION);

    // Load or create configuration
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(data_dir) = args.data_dir {
        config.database.path = data_dir.join("homeguard.db");
        config.data_dir = data_dir;
    }
    if let Some(mqtt) = args.mqtt_broker {
        config.streaming.mqtt_enabled = true;
        config.streaming.mqtt_broker = mqtt;
    }

    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    // History store
    let store: Option<Arc<dyn HistoryStore>> = if config.database.enabled {
        let db = Database::open(&config.database)?;
        match db.cleanup(config.database.retention_days, Utc::now()) {
            Ok(removed) if removed > 0 => info!("Removed {} expired history rows", removed),
            Ok(_) => {}
            Err(e) => warn!("History cleanup failed: {}", e),
        }
        let db: Arc<dyn HistoryStore> = Arc::new(db);
        Some(db)
    } else {
        info!("History store disabled, using in-memory distance history");
        None
    };

    let event_bus = Arc::new(EventBus::new(1000));
    let controller = Arc::new(Controller::new(config.clone(), store, event_bus.clone()));
    info!("Controller initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let (ingest_tx, ingest_rx) = mpsc::channel(1000);
    let mut handles = Vec::new();

    // Ingest loop
    {
        let controller = controller.clone();
        let stop = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = controller.run(ingest_rx, stop).await {
                error!("Controller stopped with error: {}", e);
            }
        }));
    }

    // Event sources
    let mut sources: Vec<Box<dyn EventSource>> = Vec::new();
    let mut mqtt_client = None;

    if config.streaming.mqtt_enabled {
        let (client, feed) = MqttClient::new(&config.streaming);
        info!(
            "MQTT client configured for {}:{}",
            config.streaming.mqtt_broker, config.streaming.mqtt_port
        );
        sources.push(Box::new(feed));
        mqtt_client = Some(client);
    }
    if config.demo_mode {
        sources.push(Box::new(DemoNode::new(Duration::from_millis(500))?));
    }
    if sources.is_empty() {
        warn!("No event source enabled; enable MQTT or run with --demo");
    }

    for mut source in sources {
        let tx = ingest_tx.clone();
        let stop = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            info!("Event source '{}' started", source.name());
            if let Err(e) = source.run(tx, stop).await {
                error!("Event source '{}' failed: {}", source.name(), e);
            }
        }));
    }
    drop(ingest_tx);

    // Outbound commands and status
    if let Some(client) = mqtt_client.clone() {
        let manager = StreamingManager::new(config.streaming.clone(), client);
        let events = event_bus.subscribe();
        let stop = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = manager.run(events, stop).await {
                error!("Streaming manager stopped with error: {}", e);
            }
        }));
    }

    // Periodic work
    let scheduler = Scheduler::new();
    {
        let controller = controller.clone();
        scheduler
            .add_task(
                "tick",
                Duration::from_millis(config.detection.tick_interval_ms.max(1)),
                move || controller.on_tick(),
            )
            .await;
    }
    {
        let controller = controller.clone();
        let bus = event_bus.clone();
        scheduler
            .add_task(
                "status",
                Duration::from_secs(config.detection.status_interval_secs.max(1)),
                move || bus.publish_status(controller.snapshot()),
            )
            .await;
    }
    handles.extend(scheduler.start(&shutdown_tx).await);

    info!("HomeGuard running");
    info!("   Press Ctrl+C to shutdown");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");

    if let Some(client) = mqtt_client {
        if let Err(e) = client.disconnect().await {
            warn!("{}", e);
        }
    }
    let _ = shutdown_tx.send(());

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Task join failed: {}", e);
        }
    }

    let status = controller.snapshot();
    info!(
        "HomeGuard shutdown complete ({} messages, {} dropped)",
        status.messages_received, status.messages_dropped
    );

    Ok(())
}
