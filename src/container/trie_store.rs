use std::any::Any;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::trie::Trie;

/// Owned view of a value read from the store. The value stays alive even
/// after later writes drop it from the current root.
pub struct ValueGuard<T> {
    value: Arc<T>,
}

impl<T> Deref for ValueGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Mutable key-value facade over the immutable trie. Readers snapshot the
/// current root without blocking writers; writers serialize on
/// `write_lock`, build the new trie outside the root lock and publish it
/// under it.
#[derive(Default)]
pub struct TrieStore {
    root: Mutex<Trie>,
    write_lock: Mutex<()>,
}

impl TrieStore {
    pub fn new() -> Self {
        TrieStore::default()
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<ValueGuard<T>> {
        let snapshot = self.root.lock().clone();
        let value = snapshot.get_shared::<T>(key)?;
        Some(ValueGuard { value })
    }

    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) {
        let _writer = self.write_lock.lock();
        let snapshot = self.root.lock().clone();
        let new_trie = snapshot.put(key, value);
        *self.root.lock() = new_trie;
    }

    pub fn remove(&self, key: &str) {
        let _writer = self.write_lock.lock();
        let snapshot = self.root.lock().clone();
        let new_trie = snapshot.remove(key);
        *self.root.lock() = new_trie;
    }
}
