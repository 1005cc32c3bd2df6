//! Single-flight suppression keyed by string.
//!
//! A key is claimed by `try_acquire`; while the returned guard is alive every
//! further claim on the same key fails. Dropping the guard releases the key,
//! so a task that panics or is cancelled never leaves its key stuck.

use dashmap::DashMap;
use std::sync::Arc;

/// Set of keys with work currently in flight.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<DashMap<String, ()>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` when it is already claimed.
    pub fn try_acquire(&self, key: &str) -> Option<FlightGuard> {
        match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(FlightGuard {
                    in_flight: self.in_flight.clone(),
                    key: key.to_string(),
                })
            }
        }
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// RAII claim on one key.
#[derive(Debug)]
pub struct FlightGuard {
    in_flight: Arc<DashMap<String, ()>>,
    key: String,
}

impl FlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}
