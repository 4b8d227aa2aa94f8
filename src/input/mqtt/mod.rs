//! MQTT input source for child health sensors.
//!
//! Child sensors publish their state to `{state_prefix}/{child_id}`; this
//! module routes those messages into the state hub and publishes merged
//! results back to the broker.

mod client;
mod integration;
mod payload;

pub use client::{MqttClient, MqttEvent, MqttMessage, availability_topic, output_topic};
pub use integration::{
    MqttIntegration, MqttTasks, StateRouter, dispatch_event, subscribe_filters,
};
pub use payload::{PayloadError, parse_state_payload};
