//! Health merging for devices with several health sensors.
//!
//! A device may expose independent health signals (battery, connectivity,
//! disk, ...). This module merges them into a single severity plus a
//! combined status text.
//!
//! The merge itself ([`MergeEngine::evaluate`]) is a pure function over a
//! snapshot of [`ChildReading`]s. [`HealthMergeSensor`] is the live adapter:
//! it watches its children through a [`ChangeNotifier`], reads them from a
//! [`StateStore`] and publishes every new result to an output sink.

pub mod merge;
pub mod notifier;
pub mod reading;
pub mod sensor;
pub mod severity;
pub mod store;

pub use merge::{MergeEngine, MergeSet, MergedOutput, NO_PROBLEM_TEXT, evaluate};
pub use notifier::{ChangeCallback, ChangeNotifier, LocalNotifier, SubscriptionHandle};
pub use reading::ChildReading;
pub use sensor::HealthMergeSensor;
pub use severity::{ChildState, STATE_UNAVAILABLE, SeverityLevel};
pub use store::{ATTR_STATUS, RawState, StateHub, StateStore};
