//! MQTT integration for health merging.
//!
//! Feeds child states from the broker into the [`StateHub`] and publishes
//! merged states coming out of a [`ChannelSink`](crate::output::ChannelSink).

use super::client::{
    MqttClient, MqttEvent, MqttMessage, ONLINE, availability_topic, output_topic,
};
use super::payload::parse_state_payload;
use crate::config::MqttConfig;
use crate::health::StateHub;
use crate::output::{ExposedState, PublishedState};
use log::{debug, info, warn};
use rumqttc::{AsyncClient, QoS, SubscribeFilter};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Maps child state topics onto the state hub.
pub struct StateRouter {
    state_prefix: String,
    watched: BTreeSet<String>,
    hub: Arc<StateHub>,
}

impl StateRouter {
    pub fn new(
        state_prefix: impl Into<String>,
        watched: impl IntoIterator<Item = String>,
        hub: Arc<StateHub>,
    ) -> Self {
        Self {
            state_prefix: state_prefix.into(),
            watched: watched.into_iter().collect(),
            hub,
        }
    }

    /// Topics to subscribe to, one per watched child.
    pub fn topics(&self) -> Vec<String> {
        self.watched
            .iter()
            .map(|id| format!("{}/{}", self.state_prefix, id))
            .collect()
    }

    /// Watched child id addressed by `topic`.
    pub fn child_for_topic<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let id = topic
            .strip_prefix(self.state_prefix.as_str())?
            .strip_prefix('/')?;
        self.watched.contains(id).then_some(id)
    }

    /// Apply a message to the hub. Returns whether a watched state changed.
    pub fn handle_message(&self, msg: &MqttMessage) -> bool {
        let Some(id) = self.child_for_topic(&msg.topic) else {
            debug!("[MQTT] Ignoring message on unwatched topic {}", msg.topic);
            return false;
        };

        match parse_state_payload(&msg.payload) {
            Ok(state) => self.hub.set(id, state),
            Err(e) => {
                warn!("[MQTT] Failed to parse state of {}: {}", id, e);
                false
            }
        }
    }

    /// Mark every watched child unavailable, e.g. after losing the broker.
    pub fn mark_all_unavailable(&self) {
        for id in &self.watched {
            self.hub.mark_unavailable(id);
        }
    }
}

/// Topic filters for one `SUBSCRIBE` request covering every watched child.
pub fn subscribe_filters(topics: &[String]) -> Vec<SubscribeFilter> {
    topics
        .iter()
        .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce))
        .collect()
}

/// Apply one event from the MQTT event loop.
///
/// Never waits on the MQTT client: connection setup is handed to the
/// publisher through `connected`, so the event loop is always drained.
pub fn dispatch_event(
    router: &StateRouter,
    event: MqttEvent,
    connected: &mpsc::UnboundedSender<()>,
) {
    match event {
        MqttEvent::Connected => {
            if connected.send(()).is_err() {
                debug!("[MQTT] Publisher stopped, dropping connect notification");
            }
        }
        MqttEvent::Message(msg) => {
            router.handle_message(&msg);
        }
        MqttEvent::Disconnected => {
            warn!("[MQTT] Broker connection lost, marking children unavailable");
            router.mark_all_unavailable();
        }
    }
}

/// Tasks spawned by [`MqttIntegration::start`].
pub struct MqttTasks {
    handles: Vec<JoinHandle<()>>,
}

impl MqttTasks {
    /// Abort the event loop, the event reader and the publisher.
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// MQTT integration orchestrator.
///
/// Manages the MQTT client, routes child states into the hub and publishes
/// merged states as retained JSON messages.
pub struct MqttIntegration {
    config: MqttConfig,
    router: StateRouter,
    outputs: mpsc::UnboundedReceiver<PublishedState>,
}

impl MqttIntegration {
    pub fn new(
        config: MqttConfig,
        hub: Arc<StateHub>,
        watched: Vec<String>,
        outputs: mpsc::UnboundedReceiver<PublishedState>,
    ) -> Self {
        let router = StateRouter::new(config.state_prefix.clone(), watched, hub);
        Self {
            config,
            router,
            outputs,
        }
    }

    /// Start the MQTT integration.
    ///
    /// Spawns the client event loop, a task applying incoming events to the
    /// hub and a task issuing subscriptions and publishes. The returned
    /// [`MqttTasks`] aborts all of them on shutdown.
    pub fn start(self) -> MqttTasks {
        info!(
            "[MQTT] Connecting to {}:{}",
            self.config.broker_host, self.config.broker_port
        );

        let mqtt_client = MqttClient::new(&self.config);
        let publisher = OutputPublisher {
            client: mqtt_client.client(),
            topics: self.router.topics(),
            config: self.config,
            published: HashMap::new(),
        };
        let router = self.router;
        let outputs = self.outputs;

        let (event_tx, mut event_rx) = mpsc::channel::<MqttEvent>(64);
        let (connected_tx, connected_rx) = mpsc::unbounded_channel::<()>();

        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(event_tx).await;
        });

        let events = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                dispatch_event(&router, event, &connected_tx);
            }
            debug!("[MQTT] Event loop stopped");
        });

        let publishing = tokio::spawn(async move {
            publisher.run(connected_rx, outputs).await;
        });

        MqttTasks {
            handles: vec![mqtt_loop, events, publishing],
        }
    }
}

/// Issues subscriptions and retained publishes through the MQTT client.
struct OutputPublisher {
    config: MqttConfig,
    client: AsyncClient,
    topics: Vec<String>,
    /// Last published payload per merge set, replayed after reconnects.
    published: HashMap<String, String>,
}

impl OutputPublisher {
    async fn run(
        mut self,
        mut connected: mpsc::UnboundedReceiver<()>,
        mut outputs: mpsc::UnboundedReceiver<PublishedState>,
    ) {
        loop {
            tokio::select! {
                signal = connected.recv() => match signal {
                    Some(()) => self.on_connected().await,
                    None => break,
                },
                output = outputs.recv() => match output {
                    Some((id, record)) => {
                        if let Some(payload) = self.publish(&id, &record).await {
                            self.published.insert(id, payload);
                        }
                    }
                    None => break,
                },
            }
        }
    }

    async fn on_connected(&self) {
        info!("[MQTT] Connection established, subscribing to topics");
        if !self.topics.is_empty()
            && let Err(e) = self
                .client
                .subscribe_many(subscribe_filters(&self.topics))
                .await
        {
            warn!("[MQTT] Failed to subscribe to child topics: {:?}", e);
        }

        if let Err(e) = self
            .client
            .publish(availability_topic(&self.config), QoS::AtLeastOnce, true, ONLINE)
            .await
        {
            warn!("[MQTT] Failed to publish availability: {:?}", e);
        }

        for (id, payload) in &self.published {
            let topic = output_topic(&self.config, id);
            if let Err(e) = self
                .client
                .publish(topic, QoS::AtLeastOnce, true, payload.clone())
                .await
            {
                warn!("[MQTT] Failed to republish {}: {:?}", id, e);
            }
        }
    }

    async fn publish(&self, id: &str, record: &ExposedState) -> Option<String> {
        let payload = match serde_json::to_string(record) {
            Ok(p) => p,
            Err(e) => {
                warn!("[MQTT] Failed to serialise state of {}: {}", id, e);
                return None;
            }
        };

        let topic = output_topic(&self.config, id);
        debug!("Publishing to {}: {}", topic, payload);
        if let Err(e) = self
            .client
            .publish(topic, QoS::AtLeastOnce, true, payload.clone())
            .await
        {
            warn!("[MQTT] Failed to publish {}: {:?}", id, e);
        }
        Some(payload)
    }
}
