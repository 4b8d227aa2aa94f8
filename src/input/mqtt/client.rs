//! MQTT client wrapper for health state traffic.

use crate::config::MqttConfig;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

/// Payload published on the availability topic while connected.
pub const ONLINE: &str = "online";
/// Last will payload published by the broker when the daemon drops off.
pub const OFFLINE: &str = "offline";

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// Connection and message events from the event loop.
#[derive(Debug, Clone)]
pub enum MqttEvent {
    /// Broker accepted the connection. Subscriptions must be (re)issued.
    Connected,
    Message(MqttMessage),
    /// Connection lost; the event loop keeps retrying.
    Disconnected,
}

/// MQTT client for health state input and merged state output.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_last_will(LastWill::new(
            availability_topic(config),
            OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Run the MQTT event loop and forward events to the provided channel.
    ///
    /// Runs until the receiving side of the channel is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<MqttEvent>) {
        info!("Starting MQTT event loop");
        let mut connected = false;

        loop {
            let event = match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected = true;
                    MqttEvent::Connected
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("Invalid UTF-8 in MQTT payload on {}: {}", publish.topic, e);
                            continue;
                        }
                    };
                    debug!("Received MQTT message on {}: {}", publish.topic, payload);
                    MqttEvent::Message(MqttMessage {
                        topic: publish.topic,
                        payload,
                    })
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("MQTT connection error: {:?}", e);
                    let was_connected = std::mem::replace(&mut connected, false);
                    if was_connected && tx.send(MqttEvent::Disconnected).await.is_err() {
                        break;
                    }
                    // Wait before reconnecting
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            if tx.send(event).await.is_err() {
                error!("MQTT event channel closed");
                break;
            }
        }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}

/// Retained topic announcing whether the daemon is online.
pub fn availability_topic(config: &MqttConfig) -> String {
    format!("{}/availability", config.output_prefix)
}

/// Topic a merged state is published to.
pub fn output_topic(config: &MqttConfig, merge_id: &str) -> String {
    format!("{}/{}", config.output_prefix, merge_id)
}
