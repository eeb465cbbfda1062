// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Streaming module - MQTT transport for commands and status

mod mqtt;

pub use mqtt::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::core::{Event, EventPayload};

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Enable MQTT
    pub mqtt_enabled: bool,
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub reconnect_interval_ms: u64,

    /// Topic filter for the inbound sensor feed
    pub subscribe_filter: String,

    /// Prefix of per-actuator command topics
    pub actuator_prefix: String,

    /// Buzzer command topic, also the channel manual overrides arrive on
    pub alarm_topic: String,

    /// Retained status snapshot topic
    pub status_topic: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            mqtt_enabled: true,
            mqtt_broker: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_client_id: "homeguard".to_string(),
            mqtt_username: None,
            mqtt_password: None,
            reconnect_interval_ms: 5000,

            subscribe_filter: "#".to_string(),
            actuator_prefix: "home/actuators".to_string(),
            alarm_topic: "home/actuators/db/cmd".to_string(),
            status_topic: "home/controller/status".to_string(),
        }
    }
}

impl StreamingConfig {
    /// Command topic of an actuator, e.g. DL1 -> home/actuators/dl1/cmd
    pub fn actuator_topic(&self, actuator_id: &str) -> String {
        format!("{}/{}/cmd", self.actuator_prefix, actuator_id.to_lowercase())
    }
}

/// Sink for outbound controller traffic
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn send(&self, topic: &str, payload: &serde_json::Value, retain: bool) -> Result<()>;
}

#[async_trait::async_trait]
impl Publisher for MqttClient {
    async fn send(&self, topic: &str, payload: &serde_json::Value, retain: bool) -> Result<()> {
        self.publish(topic, payload, retain).await
    }
}

/// Forwards event bus traffic to a publisher
pub struct StreamingManager<P: Publisher> {
    config: StreamingConfig,
    publisher: P,
}

impl<P: Publisher> StreamingManager<P> {
    pub fn new(config: StreamingConfig, publisher: P) -> Self {
        Self { config, publisher }
    }

    /// Publish every bus event until shutdown. Send failures are logged, never fatal.
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<Event>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("Streaming manager started");

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => self.forward(&event).await,
                    Err(RecvError::Lagged(n)) => warn!("Publisher lagged, {} events skipped", n),
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.recv() => {
                    info!("Streaming manager shutting down...");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn forward(&self, event: &Event) {
        let (topic, payload, retain) = match &event.payload {
            EventPayload::Command(cmd) => (cmd.target.as_str(), serde_json::to_value(&cmd.payload), false),
            EventPayload::Status(status) => {
                (self.config.status_topic.as_str(), serde_json::to_value(status), true)
            }
        };

        let payload = match payload {
            Ok(p) => p,
            Err(e) => {
                warn!("Cannot encode event {}: {}", event.id, e);
                return;
            }
        };

        if let Err(e) = self.publisher.send(topic, &payload, retain).await {
            warn!("Publish to {} failed: {}", topic, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventBus;
    use crate::detection::ActuatorCommand;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default, Clone)]
    struct Recorder {
        sent: Arc<Mutex<Vec<(String, serde_json::Value, bool)>>>,
    }

    #[async_trait::async_trait]
    impl Publisher for Recorder {
        async fn send(&self, topic: &str, payload: &serde_json::Value, retain: bool) -> Result<()> {
            self.sent.lock().await.push((topic.to_string(), payload.clone(), retain));
            Ok(())
        }
    }

    #[test]
    fn test_actuator_topic() {
        let config = StreamingConfig::default();
        assert_eq!(config.actuator_topic("DL1"), "home/actuators/dl1/cmd");
        assert_eq!(config.actuator_topic("DB"), config.alarm_topic);
    }

    #[tokio::test]
    async fn test_forwards_commands() {
        let bus = EventBus::new(16);
        let recorder = Recorder::default();
        let manager = Arc::new(StreamingManager::new(StreamingConfig::default(), recorder.clone()));
        let (stop, stop_rx) = broadcast::channel(1);

        let events = bus.subscribe();
        let runner = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.run(events, stop_rx).await })
        };

        bus.publish_command(ActuatorCommand::on("home/actuators/db/cmd", Some("x".into()), None));
        for _ in 0..50 {
            if !recorder.sent.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        stop.send(()).unwrap();
        runner.await.unwrap().unwrap();

        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "home/actuators/db/cmd");
        assert_eq!(sent[0].1["command"], "ON");
        assert!(!sent[0].2);
    }
}
