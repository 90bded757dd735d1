use std::collections::BTreeMap;

use bytes::Bytes;

/// The storage kinds a key can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    String(Bytes),
}

/// Ordered name to value store.
///
/// Not synchronized: the server guards it with its keyspace lock, and replay
/// owns it exclusively before any connection is accepted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyValueStore {
    entries: BTreeMap<Bytes, DataType>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &[u8]) -> Option<&DataType> {
        self.entries.get(name)
    }

    /// Inserts or replaces the value stored under `name`.
    pub fn set(&mut self, name: Bytes, value: DataType) {
        self.entries.insert(name, value);
    }

    /// Removes `name`, returning the value it held.
    pub fn delete(&mut self, name: &[u8]) -> Option<DataType> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in lexicographic key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &DataType)> {
        self.entries.iter()
    }
}
