// ── Repeat buffer ──
//
// Bounded map of finished repeats, keyed by repeat number. Each run of the
// job is a generation: clearing bumps it, and an insert carrying an older
// generation is dropped, so a repeat fetched for the previous run never
// lands in the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::model::Repeat;

pub struct RepeatBuffer {
    entries: DashMap<u32, Arc<Repeat>>,
    generation: AtomicU64,
    capacity: usize,
}

impl RepeatBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Current generation. Capture it before fetching a repeat and pass it
    /// to [`insert`](Self::insert).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation and drop every entry.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    /// Insert a repeat fetched during `generation`. Returns `false` if a
    /// clear happened since.
    pub fn insert(&self, generation: u64, repeat: Arc<Repeat>) -> bool {
        if generation != self.generation() {
            return false;
        }
        let number = repeat.number;
        self.entries.insert(number, repeat);

        // A clear that raced the insert wins.
        if generation != self.generation() {
            self.entries.remove(&number);
            return false;
        }

        while self.entries.len() > self.capacity {
            let Some(oldest) = self.entries.iter().map(|e| *e.key()).min() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        true
    }

    pub fn get(&self, number: u32) -> Option<Arc<Repeat>> {
        self.entries.get(&number).map(|e| Arc::clone(e.value()))
    }

    /// All buffered repeats, lowest number first.
    pub fn snapshot(&self) -> Vec<Arc<Repeat>> {
        let mut all: Vec<Arc<Repeat>> = self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by_key(|r| r.number);
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Label, LabelHandler};

    fn repeat(n: u32) -> Arc<Repeat> {
        Arc::new(Repeat::new(n, Arc::new(Label::new(LabelHandler::CameraTrigger))))
    }

    #[test]
    fn insert_and_get() {
        let buf = RepeatBuffer::new(8);
        assert!(buf.insert(buf.generation(), repeat(3)));
        assert_eq!(buf.get(3).unwrap().number, 3);
        assert!(buf.get(4).is_none());
    }

    #[test]
    fn stale_generation_is_dropped() {
        let buf = RepeatBuffer::new(8);
        let generation = buf.generation();
        buf.clear();
        assert!(!buf.insert(generation, repeat(1)));
        assert!(buf.is_empty());
    }

    #[test]
    fn clear_empties() {
        let buf = RepeatBuffer::new(8);
        buf.insert(buf.generation(), repeat(1));
        buf.insert(buf.generation(), repeat(2));
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn capacity_evicts_lowest_numbers() {
        let buf = RepeatBuffer::new(2);
        for n in [5, 1, 9] {
            buf.insert(buf.generation(), repeat(n));
        }
        let numbers: Vec<u32> = buf.snapshot().iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![5, 9]);
    }
}
