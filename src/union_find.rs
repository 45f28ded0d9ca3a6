//! Disjoint-set forest over arbitrary hashable keys.
//!
//! Keys are interned into a flat arena on first sight and referenced by
//! index afterwards, so the forest never holds pointers between nodes.
//! Path compression plus union by rank gives near-constant amortized cost.
//! There is no deletion: build a fresh forest per assembly pass.

use std::collections::HashMap;
use std::hash::Hash;

/// Union-find forest.
///
/// # Examples
///
/// ```
/// use entify::UnionFind;
///
/// let mut uf = UnionFind::new();
/// uf.union(&"a", &"b");
/// uf.union(&"b", &"c");
/// assert!(uf.connected(&"a", &"c"));
/// assert_eq!(uf.set_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct UnionFind<K> {
    index: HashMap<K, usize>,
    keys: Vec<K>,
    parent: Vec<usize>,
    rank: Vec<u8>,
    sets: usize,
}

impl<K> Default for UnionFind<K> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            keys: Vec::new(),
            parent: Vec::new(),
            rank: Vec::new(),
            sets: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> UnionFind<K> {
    /// Creates an empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty forest with room for `capacity` keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            parent: Vec::with_capacity(capacity),
            rank: Vec::with_capacity(capacity),
            sets: 0,
        }
    }

    fn slot(&mut self, key: &K) -> usize {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.keys.len();
        self.index.insert(key.clone(), idx);
        self.keys.push(key.clone());
        self.parent.push(idx);
        self.rank.push(0);
        self.sets += 1;
        idx
    }

    fn root_of(&mut self, idx: usize) -> usize {
        let mut root = idx;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Second pass points every node on the path straight at the root.
        let mut node = idx;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Returns the arena index of the root of `key`'s set.
    ///
    /// Registers `key` as its own singleton set on first sight.
    pub fn find(&mut self, key: &K) -> usize {
        let idx = self.slot(key);
        self.root_of(idx)
    }

    /// Merges the sets containing `a` and `b`.
    ///
    /// Returns `false` when they were already in the same set.
    pub fn union(&mut self, a: &K, b: &K) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }

        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        self.sets -= 1;
        true
    }

    /// True when both keys are known and share a root.
    ///
    /// Unlike [`find`](Self::find) this never registers new keys.
    pub fn connected(&mut self, a: &K, b: &K) -> bool {
        let (Some(&ia), Some(&ib)) = (self.index.get(a), self.index.get(b)) else {
            return false;
        };
        self.root_of(ia) == self.root_of(ib)
    }

    /// Key stored at an arena index, e.g. a root returned by `find`.
    #[must_use]
    pub fn key(&self, idx: usize) -> Option<&K> {
        self.keys.get(idx)
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no key has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of disjoint sets.
    #[must_use]
    pub const fn set_count(&self) -> usize {
        self.sets
    }
}
