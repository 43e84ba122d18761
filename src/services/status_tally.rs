//! Process-local tally of observed flight status codes.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::models::StatusCode;

/// The late-airline advisory fires once the count passes this many sightings.
pub const LATE_AIRLINE_ADVISORY_THRESHOLD: u64 = 3;

/// One row of the tally snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: StatusCode,
    pub count: u64,
}

/// Counter over the fixed status-code domain. Created once at process start
/// and shared by reference; mutated only by the status-resolved event
/// handler; resets on restart. Diagnostic only; nothing on-chain reads it.
#[derive(Debug)]
pub struct StatusTally {
    counts: Mutex<BTreeMap<StatusCode, u64>>,
}

impl StatusTally {
    pub fn new() -> Self {
        let counts = StatusCode::ALL.iter().map(|&status| (status, 0)).collect();
        Self {
            counts: Mutex::new(counts),
        }
    }

    /// Records one observation and returns the new count for that code.
    pub fn record(&self, status: StatusCode) -> u64 {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(status).or_insert(0);
        *count += 1;
        *count
    }

    /// Current counts in code order, every domain code present.
    pub fn snapshot(&self) -> Vec<StatusCount> {
        self.counts
            .lock()
            .unwrap()
            .iter()
            .map(|(&status, &count)| StatusCount { status, count })
            .collect()
    }
}

impl Default for StatusTally {
    fn default() -> Self {
        Self::new()
    }
}
