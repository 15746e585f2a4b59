//! Open-addressed, string-keyed hash table.
//!
//! Used for both the VM's global-variable table and the string intern set.
//! Linear probing, 0.75 load factor, and "tombstone marks true" deletion —
//! a tombstone is a slot whose key is gone but whose presence must still
//! stop probes from treating the slot as never-used.

use crate::object::{Heap, ObjHandle};
use crate::value::Value;

#[derive(Clone)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(ObjHandle, Value),
}

/// A hash table keyed by interned-string handles.
#[derive(Clone, Default)]
pub struct Table {
    entries: Vec<Slot>,
    /// Live entries *and* tombstones — matches the reference table's
    /// `count`, which only ever grows via insertion and never shrinks on
    /// delete, so that tombstone buildup still eventually triggers a
    /// rehash.
    count: usize,
}

impl Table {
    pub fn new() -> Self {
        Table { entries: Vec::new(), count: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of live entries and tombstones.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, key: ObjHandle, heap: &Heap) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = self.find_entry(key, heap);
        match &self.entries[idx] {
            Slot::Occupied(k, v) if *k == key => Some(*v),
            _ => None,
        }
    }

    /// Inserts or overwrites `key`. Returns `true` if this created a new
    /// entry (the reference table's `table_set` return value), `false` if
    /// it overwrote an existing one.
    pub fn set(&mut self, key: ObjHandle, value: Value, heap: &Heap) -> bool {
        if self.count + 1 > self.capacity() * 3 / 4 {
            self.grow(heap);
        }
        let idx = self.find_entry(key, heap);
        let was_empty = matches!(self.entries[idx], Slot::Empty);
        let is_new_key = !matches!(&self.entries[idx], Slot::Occupied(k, _) if *k == key);
        if is_new_key && was_empty {
            self.count += 1;
        }
        self.entries[idx] = Slot::Occupied(key, value);
        is_new_key
    }

    /// Removes `key`, leaving a tombstone in its slot. Returns whether the
    /// key was present.
    pub fn delete(&mut self, key: ObjHandle, heap: &Heap) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let idx = self.find_entry(key, heap);
        if matches!(&self.entries[idx], Slot::Occupied(k, _) if *k == key) {
            self.entries[idx] = Slot::Tombstone;
            true
        } else {
            false
        }
    }

    /// Copies every live entry from `from` into `self`.
    pub fn add_all(&mut self, from: &Table, heap: &Heap) {
        for slot in &from.entries {
            if let Slot::Occupied(k, v) = slot {
                self.set(*k, *v, heap);
            }
        }
    }

    /// Looks up a string by content rather than handle — the only way to
    /// find an already-interned string before you have a handle for the
    /// (possibly not yet allocated) candidate.
    pub fn find_string(&self, chars: &str, hash: u32, heap: &Heap) -> Option<ObjHandle> {
        if self.entries.is_empty() {
            return None;
        }
        let cap = self.capacity();
        let mut idx = hash as usize % cap;
        loop {
            match &self.entries[idx] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied(k, _) => {
                    if heap.hash_of(*k) == hash && heap.as_str(*k) == chars {
                        return Some(*k);
                    }
                }
            }
            idx = (idx + 1) % cap;
        }
    }

    fn find_entry(&self, key: ObjHandle, heap: &Heap) -> usize {
        let cap = self.capacity();
        let mut idx = heap.hash_of(key) as usize % cap;
        let mut tombstone = None;
        loop {
            match &self.entries[idx] {
                Slot::Empty => return tombstone.unwrap_or(idx),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(idx);
                    }
                }
                Slot::Occupied(k, _) => {
                    if *k == key {
                        return idx;
                    }
                }
            }
            idx = (idx + 1) % cap;
        }
    }

    fn grow(&mut self, heap: &Heap) {
        let new_capacity = if self.capacity() < 8 { 8 } else { self.capacity() * 2 };
        let old_entries = std::mem::replace(&mut self.entries, vec![Slot::Empty; new_capacity]);
        self.count = 0;
        for slot in old_entries {
            if let Slot::Occupied(k, v) = slot {
                let idx = self.find_entry(k, heap);
                self.entries[idx] = Slot::Occupied(k, v);
                self.count += 1;
            }
        }
    }
}
