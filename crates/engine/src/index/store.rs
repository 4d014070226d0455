use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashSet;

use crate::error::IndexError;
use crate::scan::BlockMatch;
use crate::world::position::{BlockPos, Dimension, WorldAddress};

use super::arena::{TypeArena, TypeKey};
use super::{
    IndexOptions, IndexRow, IndexSummary, IndexedPosition, IndexedType, POSITIONS_FILE, SUMMARY_FILE, SummaryRecord,
    TypeQuery,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IndexKey {
    ty: TypeKey,
    dimension: Dimension,
    pos: BlockPos,
}

/// Builds an index directory while a scan runs.
///
/// `observe` may be called from every scan worker at once. Rows are written
/// in batches; each batch is synced before it counts as durable. The store is
/// flushed and its summary written by [`finish`](Self::finish), or by `Drop`
/// on any other exit path.
pub struct BlockIndexStore {
    dir: PathBuf,
    options: IndexOptions,
    arena: TypeArena,
    /// Every key counted so far, stored or dropped for the cap.
    seen: DashSet<IndexKey>,
    /// Keys whose rows are durable or still pending.
    persisted: DashSet<IndexKey>,
    writer: Mutex<RowWriter>,
    finished: bool,
}

impl BlockIndexStore {
    /// Create (or rebuild) the index in `dir`. `types` pre-registers the
    /// target set so scan workers never contend on interning.
    pub fn create(
        dir: impl Into<PathBuf>,
        options: IndexOptions,
        types: impl IntoIterator<Item = Arc<str>>,
    ) -> Result<Self, IndexError> {
        options.validate()?;
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        // A stale summary would describe rows that are about to be truncated.
        match fs::remove_file(dir.join(SUMMARY_FILE)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        let file = File::create(dir.join(POSITIONS_FILE))?;

        tracing::info!("Building block index in {} (cap {} per type)", dir.display(), options.cap);
        Ok(Self {
            dir,
            options,
            arena: TypeArena::seeded(types),
            seen: DashSet::new(),
            persisted: DashSet::new(),
            writer: Mutex::new(RowWriter::new(file)),
            finished: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    /// Count a match and persist it while its type is under the cap.
    ///
    /// Returns whether the match was persisted. Re-observing a (type,
    /// dimension, position) already seen changes nothing, whether it was
    /// stored or dropped for the cap. When a write fails, the rows it lost
    /// stop counting as persisted.
    pub fn observe(&self, found: &BlockMatch) -> Result<bool, IndexError> {
        let (ty, counter) = self.arena.intern(&found.block);
        let key = IndexKey {
            ty,
            dimension: found.dimension().clone(),
            pos: found.pos(),
        };
        // Claimed before a cap slot so racing duplicates never hold one.
        if !self.seen.insert(key.clone()) {
            return Ok(false);
        }
        counter.count();
        if !counter.try_reserve(self.options.cap as u64) {
            counter.mark_capped();
            return Ok(false);
        }
        self.persisted.insert(key);

        let mut writer = self.lock_writer();
        let lost_before = writer.lost.len();
        let pushed = writer.push(IndexRow::from_match(found), self.options.batch_size);
        if pushed.is_err() {
            self.forget(&writer.lost[lost_before..]);
        }
        pushed.map(|()| true)
    }

    /// Persisted positions whose type matches `query`, optionally in one
    /// dimension, sorted by address.
    pub fn query(&self, query: &TypeQuery, dimension: Option<&Dimension>) -> Vec<IndexedPosition> {
        let types = self.arena.select(|name| query.matches(name));
        let mut found: Vec<IndexedPosition> = self
            .persisted
            .iter()
            .filter(|key| dimension.is_none_or(|d| *d == key.dimension))
            .filter_map(|key| {
                types.get(&key.ty).map(|block| IndexedPosition {
                    address: WorldAddress::new(key.dimension.clone(), key.pos),
                    block: Arc::clone(block),
                })
            })
            .collect();
        found.sort();
        found
    }

    /// Per-type totals, sorted by type.
    pub fn summary(&self) -> Vec<IndexedType> {
        self.arena.snapshot()
    }

    /// Flush everything and write the summary record.
    pub fn finish(mut self) -> IndexSummary {
        self.close()
    }

    fn close(&mut self) -> IndexSummary {
        self.finished = true;
        let mut writer = self.lock_writer();

        let lost_before = writer.lost.len();
        if let Err(err) = writer.flush() {
            tracing::error!("Final index flush failed: {}", err);
            self.forget(&writer.lost[lost_before..]);
        }
        // Taken after the flush: `persisted` now counts durable rows only.
        let types = self.arena.snapshot();
        let record = SummaryRecord {
            cap: self.options.cap,
            types: types.clone(),
            lost: writer.lost.clone(),
        };
        if let Err(err) = write_summary(&self.dir, &record) {
            tracing::error!("Writing index summary failed: {}", err);
            writer.failure.get_or_insert_with(|| format!("summary: {err}"));
        }

        let summary = IndexSummary {
            dir: self.dir.clone(),
            cap: self.options.cap,
            types,
            durable_rows: writer.durable,
            lost: writer.lost.clone(),
            failure: writer.failure.clone(),
        };
        drop(writer);

        if summary.is_complete() {
            tracing::info!(
                "Block index closed: {} rows across {} types",
                summary.durable_rows,
                summary.types.len(),
            );
        } else {
            tracing::error!(
                "Block index is partial: {} rows durable, {} lost",
                summary.durable_rows,
                summary.lost.len(),
            );
        }
        summary
    }

    /// Release the cap slots of rows that will never reach disk.
    fn forget(&self, lost: &[IndexedPosition]) {
        for position in lost {
            let (ty, counter) = self.arena.intern(&position.block);
            let key = IndexKey {
                ty,
                dimension: position.address.dimension.clone(),
                pos: position.address.pos,
            };
            if self.persisted.remove(&key).is_some() {
                counter.unpersist();
            }
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, RowWriter> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BlockIndexStore {
    fn drop(&mut self) {
        if !self.finished {
            self.close();
        }
    }
}

/// Batched, synced appends to `positions.jsonl`.
struct RowWriter {
    file: File,
    pending: Vec<IndexRow>,
    durable: u64,
    lost: Vec<IndexedPosition>,
    failure: Option<String>,
}

impl RowWriter {
    fn new(file: File) -> Self {
        Self {
            file,
            pending: Vec::new(),
            durable: 0,
            lost: Vec::new(),
            failure: None,
        }
    }

    fn push(&mut self, row: IndexRow, batch_size: usize) -> Result<(), IndexError> {
        if self.failure.is_some() {
            self.lost.push(row.position());
            return Err(self.failed());
        }
        self.pending.push(row);
        if self.pending.len() >= batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IndexError> {
        if self.failure.is_some() {
            return Err(self.failed());
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::with_capacity(self.pending.len() * 96);
        for row in &self.pending {
            if let Err(err) = serde_json::to_writer(&mut buf, row) {
                return Err(self.fail(err.to_string()));
            }
            buf.push(b'\n');
        }

        let written = self.file.write_all(&buf).and_then(|()| self.file.sync_data());
        match written {
            Ok(()) => {
                self.durable += self.pending.len() as u64;
                self.pending.clear();
                Ok(())
            }
            Err(err) => Err(self.fail(err.to_string())),
        }
    }

    fn fail(&mut self, reason: String) -> IndexError {
        tracing::error!("Block index write failed: {}", reason);
        self.failure = Some(reason);
        let pending = mem::take(&mut self.pending);
        self.lost.extend(pending.iter().map(IndexRow::position));
        self.failed()
    }

    fn failed(&self) -> IndexError {
        IndexError::Persistence {
            durable: self.durable,
            lost: self.lost.len() as u64,
            reason: self.failure.clone().unwrap_or_default(),
        }
    }
}

fn write_summary(dir: &Path, record: &SummaryRecord) -> Result<(), IndexError> {
    let tmp = dir.join(format!("{SUMMARY_FILE}.tmp"));
    let mut out = BufWriter::new(File::create(&tmp)?);
    serde_json::to_writer_pretty(&mut out, record)?;
    out.flush()?;
    out.get_ref().sync_data()?;
    fs::rename(&tmp, dir.join(SUMMARY_FILE))?;
    Ok(())
}
