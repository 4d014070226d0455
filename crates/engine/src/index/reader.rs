use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::IndexError;
use crate::world::position::Dimension;

use super::{IndexRow, IndexedPosition, IndexedType, POSITIONS_FILE, SUMMARY_FILE, SummaryRecord, TypeQuery};

/// A finished index loaded back from disk.
pub struct BlockIndex {
    dir: PathBuf,
    cap: usize,
    types: Vec<IndexedType>,
    rows: BTreeMap<String, Vec<IndexRow>>,
    /// Positions the writer accepted but failed to store.
    lost: Vec<IndexedPosition>,
    /// False when `summary.json` was missing (the writer never closed) or
    /// lists lost positions.
    complete: bool,
}

impl BlockIndex {
    /// Load the index in `dir`.
    ///
    /// A final line cut short by an interrupted write is dropped with a
    /// warning. Any other unreadable row is an error.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, IndexError> {
        let dir = dir.as_ref().to_path_buf();

        let summary = match fs::read(dir.join(SUMMARY_FILE)) {
            Ok(bytes) => Some(serde_json::from_slice::<SummaryRecord>(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("{} has no {}; index is partial", dir.display(), SUMMARY_FILE);
                None
            }
            Err(e) => return Err(e.into()),
        };

        let summary_present = summary.is_some();
        let reader = BufReader::new(File::open(dir.join(POSITIONS_FILE))?);
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        let last = lines.iter().rposition(|l| !l.trim().is_empty());

        let mut seen = HashSet::new();
        let mut rows: BTreeMap<String, Vec<IndexRow>> = BTreeMap::new();
        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: IndexRow = match serde_json::from_str(line) {
                Ok(row) => row,
                Err(err) if Some(i) == last => {
                    tracing::warn!("Dropping torn final row in {}: {}", POSITIONS_FILE, err);
                    break;
                }
                Err(err) => {
                    return Err(IndexError::Corrupt {
                        line: i + 1,
                        reason: err.to_string(),
                    });
                }
            };
            if seen.insert(row.position()) {
                rows.entry(row.block.clone()).or_default().push(row);
            }
        }
        for group in rows.values_mut() {
            group.sort_by(|a, b| (&a.dimension, a.pos()).cmp(&(&b.dimension, b.pos())));
        }

        let (cap, types, lost) = match summary {
            Some(record) => (record.cap, record.types, record.lost),
            None => (0, recount(&rows), Vec::new()),
        };
        let complete = summary_present && lost.is_empty();
        if !lost.is_empty() {
            tracing::warn!("{} lists {} positions that were never written", SUMMARY_FILE, lost.len());
        }
        tracing::debug!("Opened block index {} ({} types, {} rows)", dir.display(), rows.len(), seen.len());

        Ok(Self {
            dir,
            cap,
            types,
            rows,
            lost,
            complete,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Per-type cap the index was built with; 0 when unknown.
    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Positions that were counted as persisted but never reached disk.
    pub fn lost(&self) -> &[IndexedPosition] {
        &self.lost
    }

    /// Per-type totals, sorted by type.
    pub fn summary(&self) -> &[IndexedType] {
        &self.types
    }

    pub fn get(&self, block: &str) -> Option<&IndexedType> {
        self.types.iter().find(|t| t.block == block)
    }

    /// Number of persisted rows.
    pub fn len(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stored rows whose type matches `query`, optionally in one dimension.
    pub fn rows<'a>(
        &'a self,
        query: &'a TypeQuery,
        dimension: Option<&'a Dimension>,
    ) -> impl Iterator<Item = &'a IndexRow> + 'a {
        self.rows
            .iter()
            .filter(move |(block, _)| query.matches(block))
            .flat_map(|(_, group)| group.iter())
            .filter(move |row| dimension.is_none_or(|d| *d == row.dimension))
    }

    /// Persisted positions whose type matches `query`, sorted by address.
    pub fn query(&self, query: &TypeQuery, dimension: Option<&Dimension>) -> Vec<IndexedPosition> {
        let mut found: Vec<IndexedPosition> = self.rows(query, dimension).map(IndexRow::position).collect();
        found.sort();
        found
    }
}

/// Totals reconstructed from the rows alone. Dropped observations are
/// unknowable, so `total` equals `persisted`.
fn recount(rows: &BTreeMap<String, Vec<IndexRow>>) -> Vec<IndexedType> {
    rows.iter()
        .map(|(block, group)| IndexedType {
            block: block.clone(),
            total: group.len() as u64,
            persisted: group.len() as u64,
            cap_reached: false,
        })
        .collect()
}
