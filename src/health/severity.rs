//! Severity levels reported by health sensors.
//!
//! Child sensors publish their health as a short lower-case literal. The four
//! known levels form a fixed total order; `unavailable` and anything else are
//! kept apart from that order as [`ChildState`] variants.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Raw state literal a host uses for a sensor it cannot reach.
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Health severity of a sensor, ordered best to worst.
///
/// `Ord` follows the severity: `Good < Warn < Bad < Critical`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SeverityLevel {
    Good,
    Warn,
    Bad,
    Critical,
}

impl SeverityLevel {
    /// Levels worse than `Good`, in the order they are checked when merging.
    pub const PROBLEMS: [SeverityLevel; 3] = [
        SeverityLevel::Critical,
        SeverityLevel::Bad,
        SeverityLevel::Warn,
    ];

    /// Short literal used on the wire (`"critical"`, `"bad"`, ...).
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// State of one child sensor at evaluation time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChildState {
    /// One of the four known severity levels.
    Level(SeverityLevel),
    /// The sensor could not be read or reports itself unavailable.
    Unavailable,
    /// A state literal outside the known set (e.g. `"unknown"`).
    ///
    /// Counts as available but never selects a severity.
    Unrecognized(String),
}

impl ChildState {
    /// Parse a raw state literal. Never fails.
    pub fn parse(raw: &str) -> Self {
        if raw == STATE_UNAVAILABLE {
            return ChildState::Unavailable;
        }
        match raw.parse::<SeverityLevel>() {
            Ok(level) => ChildState::Level(level),
            Err(_) => ChildState::Unrecognized(raw.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, ChildState::Unavailable)
    }

    /// The severity level, if this state carries one.
    pub fn level(&self) -> Option<SeverityLevel> {
        match self {
            ChildState::Level(level) => Some(*level),
            _ => None,
        }
    }
}

impl From<SeverityLevel> for ChildState {
    fn from(level: SeverityLevel) -> Self {
        ChildState::Level(level)
    }
}
