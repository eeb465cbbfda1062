// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! MQTT client - inbound sensor feed and outbound actuator commands

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn, debug};

use super::StreamingConfig;
use crate::sensors::{EventSource, RawMessage};

/// Publishing half of the MQTT connection
#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    broker: String,
    port: u16,
}

/// Receiving half; polls the event loop and forwards decoded messages
pub struct MqttFeed {
    eventloop: EventLoop,
    client: AsyncClient,
    subscribe_filter: String,
    reconnect_interval: Duration,
}

impl MqttClient {
    /// Build both halves of a broker connection
    pub fn new(config: &StreamingConfig) -> (Self, MqttFeed) {
        let mut options = MqttOptions::new(
            &config.mqtt_client_id,
            &config.mqtt_broker,
            config.mqtt_port,
        );

        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.mqtt_username, &config.mqtt_password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, 100);

        let feed = MqttFeed {
            eventloop,
            client: client.clone(),
            subscribe_filter: config.subscribe_filter.clone(),
            reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
        };

        let client = Self {
            client,
            broker: config.mqtt_broker.clone(),
            port: config.mqtt_port,
        };

        (client, feed)
    }

    pub async fn publish<T: Serialize>(&self, topic: &str, payload: &T, retain: bool) -> Result<()> {
        let json = serde_json::to_vec(payload)?;

        self.client.publish(topic, QoS::AtMostOnce, retain, json)
            .await
            .map_err(|e| anyhow!("MQTT publish failed: {}", e))?;

        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client.disconnect()
            .await
            .map_err(|e| anyhow!("MQTT disconnect failed: {}", e))?;

        info!("MQTT client disconnected from {}:{}", self.broker, self.port);
        Ok(())
    }
}

#[async_trait]
impl EventSource for MqttFeed {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn run(
        &mut self,
        tx: mpsc::Sender<RawMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        loop {
            let polled = tokio::select! {
                polled = self.eventloop.poll() => polled,
                _ = shutdown.recv() => {
                    info!("MQTT feed shutting down...");
                    return Ok(());
                }
            };

            match polled {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("MQTT connected");
                    // subscriptions do not survive a clean-session reconnect
                    if let Err(e) = self.client.subscribe(&self.subscribe_filter, QoS::AtMostOnce).await {
                        warn!("MQTT subscribe failed: {}", e);
                    } else {
                        info!("Subscribed to MQTT topic: {}", self.subscribe_filter);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    match RawMessage::from_payload(&msg.topic, &msg.payload) {
                        Ok(raw) => {
                            if tx.send(raw).await.is_err() {
                                info!("Ingestion channel closed, MQTT feed stopping");
                                return Ok(());
                            }
                        }
                        Err(e) => debug!("Ignoring non-JSON payload on {}: {}", msg.topic, e),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT error: {:?}", e);
                    tokio::select! {
                        _ = tokio::time::sleep(self.reconnect_interval) => {}
                        _ = shutdown.recv() => {
                            info!("MQTT feed shutting down...");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
