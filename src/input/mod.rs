//! Input sources for child health states.
//!
//! Current input sources:
//! - `mqtt`: child states published to an MQTT broker
//! - `snapshot`: a static JSON snapshot of child states

pub mod mqtt;
pub mod snapshot;
