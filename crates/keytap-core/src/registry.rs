// Keytap Keyboard Registry
// Bounded arena of captured devices and their resolver contexts

use std::path::{Path, PathBuf};

/// Capacity used when the configuration does not set one
pub const DEFAULT_CAPACITY: usize = 16;

/// Stable index of an entry; entries are never removed, so ids never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyboardId(usize);

impl KeyboardId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One captured device bound to its resolver
pub struct KeyboardEntry<D, R> {
    pub path: PathBuf,
    pub name: String,
    pub device: D,
    pub resolver: R,
}

/// Fixed-capacity registry of captured keyboards.
///
/// There is no removal: an unplugged device leaves its (now unreadable)
/// descriptor here until the process restarts.
pub struct KeyboardRegistry<D, R> {
    entries: Vec<KeyboardEntry<D, R>>,
    capacity: usize,
}

impl<D, R> KeyboardRegistry<D, R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry. Returns `false`, dropping the entry (and closing
    /// its descriptor), when the registry is full.
    pub fn insert(&mut self, entry: KeyboardEntry<D, R>) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(KeyboardId, &KeyboardEntry<D, R>),
    {
        for (index, entry) in self.entries.iter().enumerate() {
            f(KeyboardId(index), entry);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeyboardId, &KeyboardEntry<D, R>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (KeyboardId(index), entry))
    }

    pub fn get(&self, id: KeyboardId) -> Option<&KeyboardEntry<D, R>> {
        self.entries.get(id.0)
    }

    pub fn get_mut(&mut self, id: KeyboardId) -> Option<&mut KeyboardEntry<D, R>> {
        self.entries.get_mut(id.0)
    }

    /// Whether the node at `path` is already captured
    pub fn contains_path(&self, path: &Path) -> bool {
        self.entries.iter().any(|entry| entry.path == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

impl<D, R> Default for KeyboardRegistry<D, R> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
