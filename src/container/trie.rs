use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

// Values are type-erased behind `Any`; the concrete type acts as the tag
// a `get::<T>` must match.
type ValueRef = Arc<dyn Any + Send + Sync>;

// One immutable node. Nodes never change after publication; mutations
// clone the path from the root down and share everything off it.
#[derive(Default)]
struct TrieNode {
    children: BTreeMap<u8, Arc<TrieNode>>,
    value: Option<ValueRef>,
}

/// Copy-on-write trie keyed by the bytes of a string. Every mutation
/// returns a new `Trie` sharing untouched subtrees with the old one;
/// existing handles observe nothing.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    pub fn new() -> Self {
        Trie::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Value stored under `key`, if present and of type `T`. A value of a
    /// different type behaves like a missing key.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for byte in key.bytes() {
            node = node.children.get(&byte)?;
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Shared handle to the value under `key`, for callers that must keep
    /// it alive past this trie.
    pub fn get_shared<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let mut node = self.root.as_ref()?;
        for byte in key.bytes() {
            node = node.children.get(&byte)?;
        }
        Arc::clone(node.value.as_ref()?).downcast::<T>().ok()
    }

    /// New trie in which `key` maps to `value`. The value moves in once
    /// and is shared by every trie that retains it; `T` need not be
    /// cloneable. Children below an overwritten key are preserved.
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) -> Trie {
        let value: ValueRef = Arc::new(value);
        Trie {
            root: Some(put_node(self.root.as_ref(), key.as_bytes(), value)),
        }
    }

    /// New trie without `key`. Value-less nodes whose subtree emptied are
    /// pruned on the way back up; an absent key returns the original trie
    /// unchanged.
    pub fn remove(&self, key: &str) -> Trie {
        let Some(root) = self.root.as_ref() else {
            return self.clone();
        };
        match remove_node(root, key.as_bytes()) {
            None => self.clone(),
            Some(new_root) => Trie { root: new_root },
        }
    }
}

fn put_node(node: Option<&Arc<TrieNode>>, key: &[u8], value: ValueRef) -> Arc<TrieNode> {
    let children = node.map(|n| n.children.clone()).unwrap_or_default();
    match key.split_first() {
        // Terminal position: keep the children, install the value.
        None => Arc::new(TrieNode {
            children,
            value: Some(value),
        }),
        Some((&byte, rest)) => {
            let mut children = children;
            let child = node.and_then(|n| n.children.get(&byte));
            children.insert(byte, put_node(child, rest, value));
            Arc::new(TrieNode {
                children,
                value: node.and_then(|n| n.value.clone()),
            })
        }
    }
}

// Outer `None`: key absent, nothing to do. Inner `None`: the rebuilt
// subtree emptied out and the edge to it must go.
fn remove_node(node: &Arc<TrieNode>, key: &[u8]) -> Option<Option<Arc<TrieNode>>> {
    match key.split_first() {
        None => {
            node.value.as_ref()?;
            if node.children.is_empty() {
                return Some(None);
            }
            Some(Some(Arc::new(TrieNode {
                children: node.children.clone(),
                value: None,
            })))
        }
        Some((&byte, rest)) => {
            let child = node.children.get(&byte)?;
            let replacement = remove_node(child, rest)?;

            let mut children = node.children.clone();
            match replacement {
                Some(child) => {
                    children.insert(byte, child);
                }
                None => {
                    children.remove(&byte);
                }
            }
            if children.is_empty() && node.value.is_none() {
                Some(None)
            } else {
                Some(Some(Arc::new(TrieNode {
                    children,
                    value: node.value.clone(),
                })))
            }
        }
    }
}
