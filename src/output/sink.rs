//! Destinations for merged states.
//!
//! A merge sensor hands each changed [`MergedOutput`] to an [`OutputSink`],
//! which exposes it as a state literal plus a `status` attribute.

use crate::health::{MergeSet, MergedOutput};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Record exposed for one merge set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExposedState {
    /// `"critical"`, `"bad"`, `"warn"`, `"good"` or `"unavailable"`.
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub friendly_name: String,
    pub last_updated: DateTime<Utc>,
}

impl ExposedState {
    pub fn new(set: &MergeSet, output: &MergedOutput) -> Self {
        Self {
            state: output.state_str().to_string(),
            status: output.status_text().map(str::to_string),
            friendly_name: set.friendly_name().to_string(),
            last_updated: Utc::now(),
        }
    }
}

/// A merged state ready for publishing.
pub type PublishedState = (String, ExposedState);

/// Destination for merged outputs.
pub trait OutputSink: Send + Sync {
    fn publish(&self, set: &MergeSet, output: &MergedOutput);
}

/// Sink that only logs merged outputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl OutputSink for LogSink {
    fn publish(&self, set: &MergeSet, output: &MergedOutput) {
        match output.status_text() {
            Some(status) => info!(
                "[{}] {}: {} ({})",
                set.id(),
                set.friendly_name(),
                output.state_str(),
                status.replace('\n', "; ")
            ),
            None => info!(
                "[{}] {}: {}",
                set.id(),
                set.friendly_name(),
                output.state_str()
            ),
        }
    }
}

/// Sink that forwards exposed records to an async publisher task.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PublishedState>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<PublishedState>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PublishedState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl OutputSink for ChannelSink {
    fn publish(&self, set: &MergeSet, output: &MergedOutput) {
        let record = ExposedState::new(set, output);
        if self.tx.send((set.id().to_string(), record)).is_err() {
            warn!("Output channel closed, dropping state for {}", set.id());
        }
    }
}
