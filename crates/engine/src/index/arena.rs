use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use slotmap::{SlotMap, new_key_type};

use super::IndexedType;

new_key_type! {
    /// Interned block type handle.
    pub(crate) struct TypeKey;
}

/// Atomic per-type counters. Updated from any scan worker without locks.
pub(crate) struct TypeCounter {
    pub name: Arc<str>,
    total: AtomicU64,
    persisted: AtomicU64,
    cap_reached: AtomicBool,
}

impl TypeCounter {
    fn new(name: Arc<str>) -> Self {
        Self {
            name,
            total: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
            cap_reached: AtomicBool::new(false),
        }
    }

    pub fn count(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Claim one persisted slot if fewer than `cap` are taken.
    pub fn try_reserve(&self, cap: u64) -> bool {
        self.persisted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < cap).then_some(n + 1))
            .is_ok()
    }

    /// Give back a slot whose row was lost.
    pub fn unpersist(&self) {
        self.persisted.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn mark_capped(&self) {
        self.cap_reached.store(true, Ordering::Relaxed);
    }

    fn snapshot(&self) -> IndexedType {
        IndexedType {
            block: self.name.to_string(),
            total: self.total.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Acquire),
            cap_reached: self.cap_reached.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct ArenaInner {
    by_name: HashMap<Arc<str>, TypeKey>,
    counters: SlotMap<TypeKey, Arc<TypeCounter>>,
}

/// Interned block types and their counters.
///
/// Seeded from the target set before the scan, so the write lock is only
/// taken for types nobody announced.
#[derive(Default)]
pub(crate) struct TypeArena {
    inner: RwLock<ArenaInner>,
}

impl TypeArena {
    pub fn seeded(names: impl IntoIterator<Item = Arc<str>>) -> Self {
        let arena = Self::default();
        for name in names {
            arena.intern(&name);
        }
        arena
    }

    pub fn intern(&self, name: &Arc<str>) -> (TypeKey, Arc<TypeCounter>) {
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&key) = inner.by_name.get(name) {
                return (key, Arc::clone(&inner.counters[key]));
            }
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&key) = inner.by_name.get(name) {
            return (key, Arc::clone(&inner.counters[key]));
        }
        let counter = Arc::new(TypeCounter::new(Arc::clone(name)));
        let key = inner.counters.insert(Arc::clone(&counter));
        inner.by_name.insert(Arc::clone(name), key);
        (key, counter)
    }

    /// Keys (and names) of every type accepted by `keep`.
    pub fn select(&self, mut keep: impl FnMut(&str) -> bool) -> HashMap<TypeKey, Arc<str>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .counters
            .iter()
            .filter(|(_, c)| keep(&c.name))
            .map(|(key, c)| (key, Arc::clone(&c.name)))
            .collect()
    }

    /// Per-type totals sorted by name. Types never observed are left out.
    pub fn snapshot(&self) -> Vec<IndexedType> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut types: Vec<IndexedType> = inner
            .counters
            .values()
            .map(|c| c.snapshot())
            .filter(|t| t.total > 0)
            .collect();
        types.sort_by(|a, b| a.block.cmp(&b.block));
        types
    }
}
