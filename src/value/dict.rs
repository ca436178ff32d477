use crate::consts::{DICT_LOAD_DEN, DICT_LOAD_NUM, DICT_MIN_INDEX_SIZE};
use crate::error::ErrorKind;
use crate::value::{builtin_equals, builtin_hash, Value, ValueHash};

/// Entry-table index stored in a dict's index slots. Negative values are
/// the empty/tombstone sentinels.
pub type TupleId = i64;

/// Index slot that never held an entry.
pub const TUPLE_EMPTY: TupleId = -1;

/// Index slot whose entry was deleted; skipped on reads, reusable on
/// writes.
pub const TUPLE_TOMBSTONE: TupleId = -2;

#[derive(Debug, Clone)]
struct DictKey {
    hash: ValueHash,
    key: Value,
}

/// Open-addressed hash table with a separated index.
///
/// `tids` maps probe slots to entries in the parallel key/value tables;
/// keys carry their hash so resizing never re-hashes. Deletion leaves a
/// tombstone in the index and an `Invalid` key in the entry table; the
/// entry table is compacted only when the index grows.
///
/// As long as no deletion occurs, tuple ids are stable, which is what
/// lets module variable tables hand them out as variable slots.
#[derive(Debug)]
pub struct DictObject {
    tids: Vec<TupleId>,
    keys: Vec<DictKey>,
    values: Vec<Value>,
    /// Non-empty index slots, tombstones included.
    used: usize,
    /// Live entries.
    len: usize,
}

impl Default for DictObject {
    fn default() -> Self {
        Self::new()
    }
}

impl DictObject {
    /// An empty dict at the minimum index size.
    pub fn new() -> Self {
        Self {
            tids: vec![TUPLE_EMPTY; DICT_MIN_INDEX_SIZE],
            keys: Vec::new(),
            values: Vec::new(),
            used: 0,
            len: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the dict holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the index table.
    pub fn index_size(&self) -> usize {
        self.tids.len()
    }

    /// Find the entry for `key`, if present.
    pub fn find_tid(&self, key: &Value) -> Result<Option<TupleId>, ErrorKind> {
        let hash = builtin_hash(key)?;
        Ok(self.probe(key, hash).found)
    }

    /// Look up `key`, cloning the stored value.
    pub fn get(&self, key: &Value) -> Result<Option<Value>, ErrorKind> {
        let tid = self.find_tid(key)?;
        Ok(tid.map(|tid| self.values[tid as usize].clone()))
    }

    /// Whether `key` is present.
    pub fn has(&self, key: &Value) -> Result<bool, ErrorKind> {
        Ok(self.find_tid(key)?.is_some())
    }

    /// Insert or overwrite, returning the entry's tuple id.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<TupleId, ErrorKind> {
        let hash = builtin_hash(&key)?;
        Ok(self.insert_with_hash(key, value, hash))
    }

    /// Insert with a caller-supplied hash; the hash must match what
    /// [`builtin_hash`] would produce for `key`.
    pub fn insert_with_hash(&mut self, key: Value, value: Value, hash: ValueHash) -> TupleId {
        if let Some(tid) = self.probe(&key, hash).found {
            self.values[tid as usize] = value;
            return tid;
        }

        if (self.used + 1) * DICT_LOAD_DEN > self.index_size() * DICT_LOAD_NUM {
            self.grow();
        }

        let probe = self.probe(&key, hash);
        let slot = probe.insert_slot;
        let tid = self.keys.len() as TupleId;

        self.keys.push(DictKey { hash, key });
        self.values.push(value);

        if self.tids[slot] == TUPLE_EMPTY {
            self.used += 1;
        }
        self.tids[slot] = tid;
        self.len += 1;

        debug_assert!(self.len <= self.used && self.used <= self.index_size());

        tid
    }

    /// Delete `key`, returning its value. Leaves a tombstone in the
    /// index; the entry slot is reclaimed at the next index growth.
    pub fn delete(&mut self, key: &Value) -> Result<Option<Value>, ErrorKind> {
        let hash = builtin_hash(key)?;
        let probe = self.probe(key, hash);

        let Some(tid) = probe.found else {
            return Ok(None);
        };

        self.tids[probe.found_slot] = TUPLE_TOMBSTONE;
        self.keys[tid as usize].key = Value::Invalid;
        let value = std::mem::take(&mut self.values[tid as usize]);
        self.len -= 1;

        Ok(Some(value))
    }

    /// Key of an entry by tuple id; `None` when deleted or out of range.
    pub fn entry_key(&self, tid: TupleId) -> Option<&Value> {
        let entry = self.keys.get(usize::try_from(tid).ok()?)?;
        (!entry.key.is_invalid()).then_some(&entry.key)
    }

    /// Value of an entry by tuple id.
    pub fn entry_value(&self, tid: TupleId) -> Option<&Value> {
        self.values.get(usize::try_from(tid).ok()?)
    }

    /// Overwrite the value of an entry by tuple id.
    pub fn set_entry_value(&mut self, tid: TupleId, value: Value) -> bool {
        match usize::try_from(tid).ok().and_then(|i| self.values.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Iterate live entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.keys
            .iter()
            .zip(self.values.iter())
            .filter(|(k, _)| !k.key.is_invalid())
            .map(|(k, v)| (&k.key, v))
    }

    fn probe(&self, key: &Value, hash: ValueHash) -> Probe {
        let mask = self.index_size() - 1;
        let mut slot = (hash as usize) & mask;
        let mut insert_slot = None;

        loop {
            match self.tids[slot] {
                TUPLE_EMPTY => {
                    return Probe {
                        found: None,
                        found_slot: 0,
                        insert_slot: insert_slot.unwrap_or(slot),
                    };
                }
                TUPLE_TOMBSTONE => {
                    insert_slot.get_or_insert(slot);
                }
                tid => {
                    let entry = &self.keys[tid as usize];
                    if entry.hash == hash && builtin_equals(&entry.key, key) {
                        return Probe {
                            found: Some(tid),
                            found_slot: slot,
                            insert_slot: slot,
                        };
                    }
                }
            }

            slot = (slot + 1) & mask;
        }
    }

    /// Double the index and rebuild it from the live entries, compacting
    /// the entry tables.
    fn grow(&mut self) {
        let new_size = (self.index_size() * 2).max(DICT_MIN_INDEX_SIZE);

        let old_keys = std::mem::take(&mut self.keys);
        let old_values = std::mem::take(&mut self.values);

        self.tids = vec![TUPLE_EMPTY; new_size];
        self.used = 0;
        self.len = 0;

        for (entry, value) in old_keys.into_iter().zip(old_values) {
            if !entry.key.is_invalid() {
                self.insert_with_hash(entry.key, value, entry.hash);
            }
        }
    }
}

struct Probe {
    found: Option<TupleId>,
    found_slot: usize,
    insert_slot: usize,
}
