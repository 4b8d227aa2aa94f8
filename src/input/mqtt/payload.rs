//! Child state payload parsing.
//!
//! Children publish either a bare state literal (`warn`) or JSON:
//!
//! ```text
//! {"state": "warn", "attributes": {"status": "low battery"}}
//! {"state": "warn", "status": "low battery"}
//! ```

use crate::health::{ATTR_STATUS, RawState};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("empty payload")]
    Empty,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct StatePayload {
    state: String,
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    status: Option<Value>,
}

/// Parse a child state payload.
pub fn parse_state_payload(payload: &str) -> Result<RawState, PayloadError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(PayloadError::Empty);
    }
    if !payload.starts_with('{') {
        return Ok(RawState::new(payload));
    }

    let StatePayload {
        state,
        mut attributes,
        status,
    } = serde_json::from_str(payload)?;
    if let Some(status) = status {
        attributes.entry(ATTR_STATUS).or_insert(status);
    }
    Ok(RawState { state, attributes })
}
