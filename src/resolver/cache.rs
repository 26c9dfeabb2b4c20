//! The process-wide hostname-to-address cache.
//!
//! Entries are seeded from the root hints at startup and grown as
//! resolutions discover authoritative address records.  There is no
//! TTL handling or eviction: an entry lives for the process lifetime.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

/// A shared map from canonical dotted hostname to its known
/// addresses.  Values are never empty: an unresolvable name is simply
/// absent.
///
/// Invoking `clone` gives a new instance which refers to the same
/// underlying map, so the cache can be shared between the tasks
/// serving concurrent client queries.
#[derive(Debug, Clone, Default)]
pub struct SharedCache {
    entries: Arc<Mutex<HashMap<String, Vec<Ipv4Addr>>>>,
}

impl SharedCache {
    /// Make a new, empty, shared cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The addresses known for a hostname, if any.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn lookup(&self, name: &str) -> Option<Vec<Ipv4Addr>> {
        self.entries
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .get(name)
            .cloned()
    }

    /// Record the addresses for a hostname.  Inserting an empty list
    /// is a no-op, preserving the non-empty-values invariant.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn insert(&self, name: &str, addresses: Vec<Ipv4Addr>) {
        if addresses.is_empty() {
            return;
        }

        self.entries
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert(name.to_string(), addresses);
    }
}
