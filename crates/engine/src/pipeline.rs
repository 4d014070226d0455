//! Scan wiring: one pass feeds the index store and the clusterer.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::cluster::{Structure, detect_structures};
use crate::error::IndexError;
use crate::index::{BlockIndexStore, IndexSummary};
use crate::scan::{BlockMatch, ScanReport, Scanner};
use crate::source::WorldSource;

/// Everything a scan produced. Always returned, even when the scan was
/// cancelled or the index could not be written.
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub report: ScanReport,
    pub index: Option<IndexSummary>,
    pub structures: Vec<Structure>,
    /// Set when index persistence failed and stopped the scan.
    pub persistence_failure: Option<String>,
}

impl ScanSummary {
    pub fn is_complete(&self) -> bool {
        !self.report.cancelled
            && self.persistence_failure.is_none()
            && self.index.as_ref().is_none_or(IndexSummary::is_complete)
    }
}

/// Run `scanner` once. Matches go to `store` when given; with
/// `collect_structures` they are also kept in memory and clustered at the
/// end.
///
/// A persistence failure stops the scan; the store is still closed so rows
/// already made durable stay readable.
pub fn run<S: WorldSource>(
    scanner: &Scanner<S>,
    store: Option<BlockIndexStore>,
    collect_structures: bool,
) -> ScanSummary {
    let kept: Mutex<Vec<BlockMatch>> = Mutex::new(Vec::new());

    let outcome = scanner.for_each_match(|found| {
        if let Some(store) = &store {
            store.observe(&found)?;
        }
        if collect_structures {
            kept.lock().unwrap_or_else(PoisonError::into_inner).push(found);
        }
        Ok::<(), IndexError>(())
    });

    let persistence_failure = outcome.sink_error.map(|err| {
        tracing::error!("Stopping scan: {}", err);
        err.to_string()
    });
    let index = store.map(BlockIndexStore::finish);

    let structures = if collect_structures {
        let kept = kept.into_inner().unwrap_or_else(PoisonError::into_inner);
        let structures = detect_structures(&kept);
        tracing::info!("Grouped {} matches into {} structures", kept.len(), structures.len());
        structures
    } else {
        Vec::new()
    };

    ScanSummary {
        report: outcome.report,
        index,
        structures,
        persistence_failure,
    }
}
