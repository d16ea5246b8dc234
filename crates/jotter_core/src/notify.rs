//! Change notification bus for store observers.
//!
//! # Responsibility
//! - Keep the list of observers interested in container/fragment changes.
//! - Deliver one notification per changed key after a store write commits.
//!
//! # Invariants
//! - Observers are never invoked while the store connection is locked, so an
//!   observer may read from the store inside its callback.
//! - A unit of work that touched no rows emits nothing.

use crate::model::container::ContainerId;
use crate::model::fragment::FragmentId;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Identifier of something that changed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKey {
    Container(ContainerId),
    Fragment(FragmentId),
}

/// Deduplicated, ordered set of keys touched by one unit of work.
pub type ChangeSet = BTreeSet<ChangeKey>;

/// Receives change notifications from the record store.
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self, key: ChangeKey);
}

/// Observer registry owned by one record store.
#[derive(Default)]
pub struct ChangeBus {
    observers: Mutex<Vec<Arc<dyn ChangeObserver>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one observer. The same observer may be registered only once.
    pub fn subscribe(&self, observer: Arc<dyn ChangeObserver>) {
        let mut observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if observers.iter().any(|known| Arc::ptr_eq(known, &observer)) {
            return;
        }
        observers.push(observer);
    }

    /// Removes one observer. Returns `false` when it was not registered.
    pub fn unsubscribe(&self, observer: &Arc<dyn ChangeObserver>) -> bool {
        let mut observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|known| !Arc::ptr_eq(known, observer));
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers every key in `changes` to every observer.
    pub fn publish(&self, changes: &ChangeSet) {
        if changes.is_empty() {
            return;
        }
        // Snapshot so observers can (un)subscribe from inside a callback.
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            for key in changes {
                observer.on_change(*key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeBus, ChangeKey, ChangeObserver, ChangeSet};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        keys: Mutex<Vec<ChangeKey>>,
    }

    impl ChangeObserver for Recorder {
        fn on_change(&self, key: ChangeKey) {
            self.keys.lock().unwrap().push(key);
        }
    }

    #[test]
    fn publish_delivers_keys_in_order_once_per_observer() {
        let bus = ChangeBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());
        bus.subscribe(recorder.clone());
        assert_eq!(bus.observer_count(), 1);

        let mut changes = ChangeSet::new();
        changes.insert(ChangeKey::Fragment(4));
        changes.insert(ChangeKey::Container(9));
        changes.insert(ChangeKey::Container(2));
        bus.publish(&changes);

        assert_eq!(
            *recorder.keys.lock().unwrap(),
            vec![
                ChangeKey::Container(2),
                ChangeKey::Container(9),
                ChangeKey::Fragment(4)
            ]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = ChangeBus::new();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn ChangeObserver> = recorder.clone();
        bus.subscribe(observer.clone());
        assert!(bus.unsubscribe(&observer));
        assert!(!bus.unsubscribe(&observer));

        let mut changes = ChangeSet::new();
        changes.insert(ChangeKey::Container(1));
        bus.publish(&changes);
        assert!(recorder.keys.lock().unwrap().is_empty());
    }
}
