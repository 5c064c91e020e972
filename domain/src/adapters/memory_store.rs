use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::{KeyValueStore, Record, RecordId, Records, StoreError};

/// Simple in-memory store for tests. State lives as long as the instance.
/// Not meant for concurrent writers beyond the internal mutex guarding the map.
///
/// Records are kept ordered by id, matching the file-backed store.
pub struct InMemoryStore {
    inner: Mutex<BTreeMap<RecordId, Record>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// Seed a store with existing records.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (RecordId, Record)>,
    {
        Self {
            inner: Mutex::new(records.into_iter().collect()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<RecordId, Record>>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    fn list(&self) -> Result<Records, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn get(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn add(&self, id: RecordId, data: Record) -> Result<(), StoreError> {
        self.lock()?.insert(id, data);
        Ok(())
    }

    fn remove(&self, id: &RecordId) -> Result<(), StoreError> {
        self.lock()?.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn user(name: &str) -> Record {
        Record::new().with("name", name)
    }

    #[test]
    fn add_get_roundtrip() {
        let store = InMemoryStore::new();
        store.add(1u64.into(), user("John")).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(&1u64.into()).unwrap(), Some(user("John")));
    }

    #[test]
    fn get_missing_is_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.get(&"nope".into()).unwrap(), None);
    }

    #[test]
    fn add_overwrites_existing_id() {
        let store = InMemoryStore::new();
        store.add(1u64.into(), user("John")).unwrap();
        store.add(1u64.into(), user("Jane")).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(&1u64.into()).unwrap(), Some(user("Jane")));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = InMemoryStore::new();
        store.add(1u64.into(), user("John")).unwrap();
        store.add(2u64.into(), user("Jane")).unwrap();

        store.remove(&1u64.into()).unwrap();
        let once = store.list().unwrap();
        store.remove(&1u64.into()).unwrap();
        assert_eq!(store.list().unwrap(), once);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn count_tracks_distinct_ids() {
        let store = InMemoryStore::new();
        let mut expected = BTreeSet::new();
        let ops: [(bool, u64); 8] = [
            (true, 1),
            (true, 2),
            (true, 1),
            (false, 3),
            (true, 3),
            (false, 1),
            (false, 1),
            (true, 4),
        ];
        for (is_add, id) in ops {
            if is_add {
                store.add(id.into(), user("x")).unwrap();
                expected.insert(id);
            } else {
                store.remove(&id.into()).unwrap();
                expected.remove(&id);
            }
            assert_eq!(store.count().unwrap(), expected.len());
        }
    }

    #[test]
    fn list_is_a_detached_snapshot() {
        let store = InMemoryStore::new();
        store.add(1u64.into(), user("John")).unwrap();

        let mut snapshot = store.list().unwrap();
        snapshot.insert(2u64.into(), user("Mallory"));
        snapshot.clear();

        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn list_orders_by_id() {
        let store = InMemoryStore::with_records([
            (RecordId::from("b"), user("B")),
            (RecordId::from("a"), user("A")),
        ]);
        let ids: Vec<_> = store.list().unwrap().into_keys().collect();
        assert_eq!(ids, vec![RecordId::from("a"), RecordId::from("b")]);
    }
}
