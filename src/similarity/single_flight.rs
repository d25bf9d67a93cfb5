//! Per-artist deduplication of recomputations.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

type FlightLock = Arc<tokio::sync::Mutex<Option<DateTime<Utc>>>>;

struct FlightSlot {
    lock: FlightLock,
    /// Holders plus queued waiters, including waiters whose future is
    /// still pending.
    leases: usize,
}

/// One async lock per artist currently being recomputed. Each lock
/// remembers when the last recompute it guarded finished, so callers that
/// queued behind it can tell whether they still need to trigger.
#[derive(Default)]
pub struct SingleFlight {
    slots: Mutex<HashMap<String, FlightSlot>>,
}

/// Claim on a slot, taken before waiting on its lock. Dropping it, whether
/// the lock was obtained or the waiting future was cancelled, releases the
/// slot once nobody else holds a lease.
struct SlotLease<'a> {
    owner: &'a SingleFlight,
    key: String,
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        let mut slots = self.owner.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.leases -= 1;
            if slot.leases == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

pub struct FlightGuard<'a> {
    // Field order matters: the lock is released before the lease.
    guard: OwnedMutexGuard<Option<DateTime<Utc>>>,
    _lease: SlotLease<'a>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the recompute of `key`.
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let (lease, lock) = {
            let mut slots = self.slots.lock().unwrap();
            let slot = slots.entry(key.to_string()).or_insert_with(|| FlightSlot {
                lock: FlightLock::default(),
                leases: 0,
            });
            slot.leases += 1;
            let lease = SlotLease {
                owner: self,
                key: key.to_string(),
            };
            (lease, slot.lock.clone())
        };
        let guard = lock.lock_owned().await;
        FlightGuard {
            guard,
            _lease: lease,
        }
    }

    /// Number of artists with a recompute running or queued.
    pub fn in_flight(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

impl FlightGuard<'_> {
    /// When the last recompute under this key finished, if one did while
    /// the slot was alive.
    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        *self.guard
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        *self.guard = Some(at);
    }
}
