//! Change notification for watched sensor ids.
//!
//! Merge sensors subscribe to the ids of their children and are called back
//! whenever one of them changes, so they can re-evaluate.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Callback invoked with the id of the sensor that changed.
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`ChangeNotifier::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

/// Subscription mechanism for sensor state changes.
pub trait ChangeNotifier: Send + Sync {
    /// Call `on_change` whenever any of `ids` changes.
    ///
    /// Changes to a single id are delivered in the order they occurred.
    fn subscribe(&self, ids: &[String], on_change: ChangeCallback) -> SubscriptionHandle;

    /// Release a subscription. Unknown or already released handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);
}

struct Subscription {
    ids: HashSet<String>,
    callback: ChangeCallback,
}

/// In-process subscription registry.
///
/// Callbacks run synchronously on the thread calling [`notify`](Self::notify),
/// in subscription order, with no internal lock held.
#[derive(Default)]
pub struct LocalNotifier {
    next_handle: AtomicU64,
    subscriptions: Mutex<BTreeMap<SubscriptionHandle, Subscription>>,
}

impl LocalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a change of `id` to every subscriber watching it.
    ///
    /// Returns the number of callbacks invoked.
    pub fn notify(&self, id: &str) -> usize {
        let callbacks: Vec<ChangeCallback> = self
            .subscriptions
            .lock()
            .values()
            .filter(|sub| sub.ids.contains(id))
            .map(|sub| sub.callback.clone())
            .collect();

        for callback in &callbacks {
            callback(id);
        }
        callbacks.len()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl ChangeNotifier for LocalNotifier {
    fn subscribe(&self, ids: &[String], on_change: ChangeCallback) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.subscriptions.lock().insert(
            handle,
            Subscription {
                ids: ids.iter().cloned().collect(),
                callback: on_change,
            },
        );
        handle
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscriptions.lock().remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, ChangeCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let callback: ChangeCallback = Arc::new(move |_id: &str| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn test_notify_only_watching_subscribers() {
        let notifier = LocalNotifier::new();
        let (disk_count, disk_cb) = counter();
        let (fan_count, fan_cb) = counter();
        notifier.subscribe(&["sensor.disk".to_string()], disk_cb);
        notifier.subscribe(&["sensor.fan".to_string()], fan_cb);

        assert_eq!(notifier.notify("sensor.disk"), 1);
        assert_eq!(disk_count.load(Ordering::SeqCst), 1);
        assert_eq!(fan_count.load(Ordering::SeqCst), 0);

        assert_eq!(notifier.notify("sensor.other"), 0);
    }

    #[test]
    fn test_duplicate_ids_notify_once() {
        let notifier = LocalNotifier::new();
        let (count, cb) = counter();
        let id = "sensor.disk".to_string();
        notifier.subscribe(&[id.clone(), id], cb);

        notifier.notify("sensor.disk");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let notifier = LocalNotifier::new();
        let (count, cb) = counter();
        let handle = notifier.subscribe(&["sensor.disk".to_string()], cb);
        assert_eq!(notifier.subscription_count(), 1);

        notifier.unsubscribe(handle);
        notifier.unsubscribe(handle);
        assert_eq!(notifier.subscription_count(), 0);

        notifier.notify("sensor.disk");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_may_unsubscribe_during_delivery() {
        let notifier = Arc::new(LocalNotifier::new());
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

        let notifier_clone = notifier.clone();
        let slot_clone = slot.clone();
        let handle = notifier.subscribe(
            &["sensor.disk".to_string()],
            Arc::new(move |_id: &str| {
                if let Some(handle) = slot_clone.lock().take() {
                    notifier_clone.unsubscribe(handle);
                }
            }),
        );
        *slot.lock() = Some(handle);

        assert_eq!(notifier.notify("sensor.disk"), 1);
        assert_eq!(notifier.subscription_count(), 0);
    }
}
