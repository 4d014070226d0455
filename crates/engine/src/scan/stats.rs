//! Lock-free scan counters.
//!
//! Workers bump these with relaxed atomics on the hot path; the report is a
//! snapshot taken once the scan ends.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Duration;

#[derive(Default)]
pub struct ScanStats {
    containers_scanned: AtomicU64,
    containers_absent: AtomicU64,
    containers_failed: AtomicU64,
    chunks_decoded: AtomicU64,
    chunks_absent: AtomicU64,
    chunks_skipped: AtomicU64,
    sections_examined: AtomicU64,
    sections_filtered: AtomicU64,
    matches: AtomicU64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container_scanned(&self) {
        self.containers_scanned.fetch_add(1, Relaxed);
    }

    pub fn container_absent(&self) {
        self.containers_absent.fetch_add(1, Relaxed);
    }

    pub fn container_failed(&self) {
        self.containers_failed.fetch_add(1, Relaxed);
    }

    pub fn chunk_decoded(&self) {
        self.chunks_decoded.fetch_add(1, Relaxed);
    }

    pub fn chunk_absent(&self) {
        self.chunks_absent.fetch_add(1, Relaxed);
    }

    /// A chunk that failed to decode.
    pub fn chunk_skipped(&self) {
        self.chunks_skipped.fetch_add(1, Relaxed);
    }

    pub fn section_examined(&self, filtered_out: bool) {
        self.sections_examined.fetch_add(1, Relaxed);
        if filtered_out {
            self.sections_filtered.fetch_add(1, Relaxed);
        }
    }

    pub fn matched(&self) {
        self.matches.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self, elapsed: Duration, cancelled: bool) -> ScanReport {
        ScanReport {
            containers_scanned: self.containers_scanned.load(Relaxed),
            containers_absent: self.containers_absent.load(Relaxed),
            containers_failed: self.containers_failed.load(Relaxed),
            chunks_decoded: self.chunks_decoded.load(Relaxed),
            chunks_absent: self.chunks_absent.load(Relaxed),
            chunks_skipped: self.chunks_skipped.load(Relaxed),
            sections_examined: self.sections_examined.load(Relaxed),
            sections_filtered: self.sections_filtered.load(Relaxed),
            matches: self.matches.load(Relaxed),
            elapsed_secs: elapsed.as_secs_f64(),
            cancelled,
        }
    }
}

/// Serializable end-of-scan totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub containers_scanned: u64,
    pub containers_absent: u64,
    pub containers_failed: u64,
    pub chunks_decoded: u64,
    pub chunks_absent: u64,
    pub chunks_skipped: u64,
    pub sections_examined: u64,
    /// Sub-volumes rejected by their palette without touching any position.
    pub sections_filtered: u64,
    pub matches: u64,
    pub elapsed_secs: f64,
    pub cancelled: bool,
}

impl ScanReport {
    /// Units that could not be read (failed containers plus corrupt chunks).
    pub fn skipped_units(&self) -> u64 {
        self.containers_failed + self.chunks_skipped
    }
}
