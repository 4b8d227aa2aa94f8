//! Publishing merged health to observers.
//!
//! A merged value is exposed as a state literal plus a `status` attribute
//! under the merge set's id. Sinks decide where that record goes.

mod sink;

pub use sink::{ChannelSink, ExposedState, LogSink, OutputSink, PublishedState};
