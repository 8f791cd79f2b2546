//! In-process log of executed packet tests.

use chrono::{DateTime, Utc};
use fw_filter::Action;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::probe::Reachability;

/// Outcome of one simulated packet test.
#[derive(Debug, Clone, Serialize)]
pub struct TestRecord {
    pub ip: String,
    pub port: u16,
    pub service: String,
    pub reachability: Reachability,
    pub decision: Action,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of executed tests, kept for the process lifetime.
///
/// Never persisted; a restart clears it. Growth is unbounded (low expected
/// throughput; DELETE /tests empties it on request).
#[derive(Default)]
pub struct TestHistory {
    records: RwLock<Vec<TestRecord>>,
}

impl TestHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, entry: TestRecord) {
        self.records.write().await.push(entry);
    }

    /// Snapshot of the log in insertion order.
    pub async fn list(&self) -> Vec<TestRecord> {
        self.records.read().await.clone()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
