//! The queue of candidate nameservers for one resolution.
//!
//! Among several NS referrals, the one whose name shares the longest
//! label suffix with the query name is most likely delegated closest
//! to the answer, so it should be asked first to minimise hops.

use priority_queue::PriorityQueue;
use std::collections::HashSet;

/// The priority tier for the bootstrap hints: below any computed
/// suffix match, so discovered referrals are always preferred over
/// going back to the root.
const HINT_PRIORITY: i64 = -1;

/// A priority queue of nameserver hostnames, keyed by closeness to
/// the target name.  Scoped to a single top-level resolution; it is
/// never shared between tasks.
///
/// Every hostname is offered at most once: dequeued hosts are not
/// forgotten, and re-enqueueing one is a no-op.
pub struct CandidateQueue {
    target_labels: Vec<String>,
    entries: PriorityQueue<String, i64>,
    offered: HashSet<String>,
}

impl CandidateQueue {
    /// Build a queue for `target`, seeded with the root hint
    /// hostnames at the lowest priority tier.
    pub fn new<I: IntoIterator<Item = String>>(target: &str, hints: I) -> Self {
        let mut queue = Self {
            target_labels: name_labels(target),
            entries: PriorityQueue::new(),
            offered: HashSet::new(),
        };

        for hint in hints {
            if queue.offered.insert(hint.clone()) {
                queue.entries.push(hint, HINT_PRIORITY);
            }
        }

        queue
    }

    /// Add a candidate, keyed by the length of the label suffix it
    /// shares with the target.  No-op if the host has already been
    /// offered.
    pub fn enqueue(&mut self, host: &str) {
        if self.offered.contains(host) {
            return;
        }

        let priority = common_suffix_len(&self.target_labels, &name_labels(host)) as i64;
        self.offered.insert(host.to_string());
        self.entries.push(host.to_string(), priority);
    }

    /// Remove and return the closest-matching candidate.
    pub fn dequeue(&mut self) -> Option<String> {
        self.entries.pop().map(|(host, _)| host)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Labels of a hostname, ignoring any trailing dot, so that
/// `"a.example.com"` and `"a.example.com."` compare equal.
fn name_labels(name: &str) -> Vec<String> {
    name.trim_end_matches('.')
        .split('.')
        .map(str::to_owned)
        .collect()
}

/// How many labels, counted from the end, two names share before the
/// first mismatch.
fn common_suffix_len(first: &[String], second: &[String]) -> usize {
    let mut count = 0;
    for (a, b) in first.iter().rev().zip(second.iter().rev()) {
        if a != b {
            break;
        }
        count += 1;
    }
    count
}
