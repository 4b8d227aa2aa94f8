//! Merge sensor: the live adapter around the merge engine.
//!
//! Owns the subscription to its children, snapshots them from the state
//! store on every change, re-runs the merge and publishes the result.

use super::merge::{MergeEngine, MergeSet, MergedOutput};
use super::notifier::{ChangeCallback, ChangeNotifier, SubscriptionHandle};
use super::reading::ChildReading;
use super::store::StateStore;
use crate::output::OutputSink;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

struct Attachment {
    notifier: Arc<dyn ChangeNotifier>,
    handle: SubscriptionHandle,
}

/// Merged health sensor for one [`MergeSet`].
///
/// The version is incremented each time the merged output changes; an
/// update that reproduces the previous output neither bumps the version
/// nor republishes.
///
/// Updates are serialized: snapshot, merge and publish of one update
/// complete before the next update reads the store, so the last published
/// output always reflects the latest store contents.
///
/// # Example
/// ```ignore
/// let hub = Arc::new(StateHub::new());
/// let sensor = Arc::new(HealthMergeSensor::new(set, hub.clone(), Arc::new(LogSink)));
/// sensor.attach(hub.clone());
///
/// hub.set("sensor.disk", RawState::new("critical").with_status("disk full"));
/// assert_eq!(sensor.output().unwrap().severity(), Some(SeverityLevel::Critical));
/// ```
pub struct HealthMergeSensor {
    set: MergeSet,
    engine: MergeEngine,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn OutputSink>,
    output: RwLock<Option<MergedOutput>>,
    version: AtomicU32,
    attachment: Mutex<Option<Attachment>>,
    /// Held for the whole of `update()`.
    updating: Mutex<()>,
}

impl HealthMergeSensor {
    pub fn new(set: MergeSet, store: Arc<dyn StateStore>, sink: Arc<dyn OutputSink>) -> Self {
        Self::with_engine(set, MergeEngine::default(), store, sink)
    }

    pub fn with_engine(
        set: MergeSet,
        engine: MergeEngine,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        debug!(
            "Added health merge sensor {} ({}) watching {:?}",
            set.id(),
            set.friendly_name(),
            set.children()
        );
        Self {
            set,
            engine,
            store,
            sink,
            output: RwLock::new(None),
            version: AtomicU32::new(0),
            attachment: Mutex::new(None),
            updating: Mutex::new(()),
        }
    }

    pub fn merge_set(&self) -> &MergeSet {
        &self.set
    }

    /// Last merged output, `None` before the first update.
    pub fn output(&self) -> Option<MergedOutput> {
        self.output.read().clone()
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.lock().is_some()
    }

    /// One reading per configured child, in configured order.
    pub fn snapshot(&self) -> Vec<ChildReading> {
        self.set
            .children()
            .iter()
            .map(|id| self.store.reading(id))
            .collect()
    }

    /// Re-evaluate from the current store contents and publish on change.
    pub fn update(&self) -> MergedOutput {
        let _updating = self.updating.lock();
        let output = self.engine.evaluate(&self.snapshot());

        let previous = {
            let mut last = self.output.write();
            if last.as_ref() == Some(&output) {
                return output;
            }
            last.replace(output.clone())
        };

        self.version.fetch_add(1, Ordering::SeqCst);
        match previous {
            Some(previous) if previous.state_str() != output.state_str() => info!(
                "Health of {} changed: {} -> {}",
                self.set.id(),
                previous.state_str(),
                output.state_str()
            ),
            Some(_) => debug!("Status of {} updated", self.set.id()),
            None => info!("Health of {} is {}", self.set.id(), output.state_str()),
        }
        self.sink.publish(&self.set, &output);
        output
    }

    /// Subscribe to changes of every child and run an initial update.
    ///
    /// Re-attaching releases the previous subscription first.
    pub fn attach(self: &Arc<Self>, notifier: Arc<dyn ChangeNotifier>) -> MergedOutput {
        self.detach();

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_change: ChangeCallback = Arc::new(move |_id: &str| {
            if let Some(sensor) = weak.upgrade() {
                sensor.update();
            }
        });
        let handle = notifier.subscribe(self.set.children(), on_change);
        *self.attachment.lock() = Some(Attachment { notifier, handle });

        self.update()
    }

    /// Release the subscription. Safe to call repeatedly.
    pub fn detach(&self) {
        let attachment = self.attachment.lock().take();
        if let Some(Attachment { notifier, handle }) = attachment {
            notifier.unsubscribe(handle);
            debug!("Detached health merge sensor {}", self.set.id());
        }
    }
}

impl Drop for HealthMergeSensor {
    fn drop(&mut self) {
        self.detach();
    }
}
