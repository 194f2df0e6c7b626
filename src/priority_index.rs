//! Live priority index over waiting patients.
//!
//! An in-process replacement for an external sorted set: patient id →
//! score, ordered descending by score. Exact score ties order FIFO by
//! arrival — the first upsert of an id fixes its arrival sequence and
//! later score updates keep it, so two patients scored identically rank
//! by registration order.
//!
//! The map lives behind a `RwLock`; `snapshot()` and `rank()` read under
//! the guard, so a concurrent upsert can never produce a duplicate or
//! missing entry. Staleness against the patient store is expected and
//! re-validated by the allocator before any assignment.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Entry {
    score: f64,
    arrival: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, Entry>,
    next_arrival: u64,
}

/// Shared, lock-guarded priority index.
#[derive(Default)]
pub struct PriorityIndex {
    inner: RwLock<Inner>,
}

impl PriorityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a score. Idempotent: the last written score wins,
    /// the first-seen arrival sequence is preserved.
    pub fn upsert(&self, id: Uuid, score: f64) {
        if let Ok(mut inner) = self.inner.write() {
            let arrival = match inner.entries.get(&id).map(|e| e.arrival) {
                Some(existing) => existing,
                None => {
                    let seq = inner.next_arrival;
                    inner.next_arrival += 1;
                    seq
                }
            };
            inner.entries.insert(id, Entry { score, arrival });
        }
    }

    pub fn remove(&self, id: &Uuid) {
        if let Ok(mut inner) = self.inner.write() {
            inner.entries.remove(id);
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.inner
            .read()
            .map(|inner| inner.entries.contains_key(id))
            .unwrap_or(false)
    }

    pub fn score(&self, id: &Uuid) -> Option<f64> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.entries.get(id).map(|e| e.score))
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry (daily reset).
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.entries.clear();
            inner.next_arrival = 0;
        }
    }

    /// 1-based rank of an entry in the current ordering, or `None` if absent.
    pub fn rank(&self, id: &Uuid) -> Option<i64> {
        let snapshot = self.snapshot();
        snapshot
            .iter()
            .position(|(entry_id, _)| entry_id == id)
            .map(|pos| pos as i64 + 1)
    }

    /// Full ordered dump: `(patient_id, score)` descending by score,
    /// ties FIFO by arrival. Consistent: taken under one read guard.
    pub fn snapshot(&self) -> Vec<(Uuid, f64)> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        let mut entries: Vec<(Uuid, Entry)> =
            inner.entries.iter().map(|(id, e)| (*id, *e)).collect();
        entries.sort_by(|(_, a), (_, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.arrival.cmp(&b.arrival))
        });
        entries.into_iter().map(|(id, e)| (id, e.score)).collect()
    }
}
