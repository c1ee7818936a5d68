//! Per-conversation job slots
//!
//! At most one reply job runs per ConversationKey. While it runs, further
//! triggers land in a single pending slot where the newest replaces the
//! older one; the worker picks it up when the active job terminates.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;

/// What `admit` decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission<T> {
    /// No job was active; the caller must run the trigger
    Start(T),
    /// A job is active; the trigger waits in the pending slot
    Queued {
        /// An older pending trigger was dropped
        replaced: bool,
    },
}

#[derive(Debug)]
pub struct JobCoordinator<K, T> {
    slots: Mutex<HashMap<K, Option<T>>>,
}

impl<K: Eq + Hash + Clone, T> Default for JobCoordinator<K, T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, T> JobCoordinator<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the key, or park `trigger` behind the active job
    pub fn admit(&self, key: &K, trigger: T) -> Admission<T> {
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(pending) => {
                let replaced = pending.replace(trigger).is_some();
                Admission::Queued { replaced }
            }
            None => {
                slots.insert(key.clone(), None);
                Admission::Start(trigger)
            }
        }
    }

    /// Active job finished: next pending trigger, or release the key
    pub fn finish(&self, key: &K) -> Option<T> {
        let mut slots = self.slots.lock();
        match slots.get_mut(key).and_then(Option::take) {
            Some(next) => Some(next),
            None => {
                slots.remove(key);
                None
            }
        }
    }

    /// Drop the key and anything pending (worker died)
    pub fn release(&self, key: &K) {
        self.slots.lock().remove(key);
    }

    pub fn is_active(&self, key: &K) -> bool {
        self.slots.lock().contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.slots.lock().len()
    }
}
