//! Snapshot of a single child sensor.

use super::severity::{ChildState, SeverityLevel};

/// One child sensor's state, captured fresh for a single evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildReading {
    pub id: String,
    pub state: ChildState,
    pub status_text: Option<String>,
}

impl ChildReading {
    pub fn new(id: impl Into<String>, state: impl Into<ChildState>) -> Self {
        Self {
            id: id.into(),
            state: state.into(),
            status_text: None,
        }
    }

    /// Reading for a child whose state could not be fetched.
    pub fn unavailable(id: impl Into<String>) -> Self {
        Self::new(id, ChildState::Unavailable)
    }

    /// Attach a status explanation to this reading.
    pub fn with_status(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.state.is_available()
    }

    pub fn level(&self) -> Option<SeverityLevel> {
        self.state.level()
    }

    /// Status text if present and non-empty.
    pub fn status(&self) -> Option<&str> {
        self.status_text.as_deref().filter(|text| !text.is_empty())
    }
}
