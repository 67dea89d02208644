//! Single-Flight Module
//!
//! Per-key render slots. At most one task holds the slot for a key; the
//! others wait on it. Slots exist only while someone holds or waits on
//! them, so the table never grows with the cold key space.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::flight";

// == Key Locks ==
/// Table of in-flight render slots keyed by the page cache key string.
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // == Acquire ==
    /// Waits until the slot for `key` is free and takes it.
    ///
    /// The slot is released when the returned guard is dropped, whatever
    /// path the holder leaves by. Dropping the future while waiting also
    /// gives up the reservation.
    pub async fn acquire(self: &Arc<Self>, key: &str) -> FlightGuard {
        let slot = {
            let mut slots = mutex_lock(&self.slots, SOURCE, "acquire");
            Arc::clone(
                slots
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let lease = SlotLease {
            locks: Arc::clone(self),
            key: key.to_string(),
        };

        let permit = slot.lock_owned().await;
        trace!(key, "render slot acquired");

        FlightGuard {
            permit: Some(permit),
            lease,
        }
    }

    /// Returns the number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        mutex_lock(&self.slots, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str) {
        let mut slots = mutex_lock(&self.slots, SOURCE, "release");
        // Clones are only taken under this mutex, so a count of one means
        // nobody holds or waits on the slot.
        if slots.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(key);
            trace!(key, "render slot retired");
        }
    }
}

/// Removes an idle slot from the table when dropped.
#[derive(Debug)]
struct SlotLease {
    locks: Arc<KeyLocks>,
    key: String,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}

// == Flight Guard ==
/// Exclusive hold on the render slot of one key.
///
/// Fields drop in declaration order: the permit is released before the
/// lease checks whether the slot can be retired.
#[derive(Debug)]
pub struct FlightGuard {
    permit: Option<OwnedMutexGuard<()>>,
    lease: SlotLease,
}

impl FlightGuard {
    /// Returns the key this guard holds.
    pub fn key(&self) -> &str {
        &self.lease.key
    }

    /// Releases the slot now rather than at end of scope.
    pub fn release(mut self) {
        self.permit.take();
    }
}
