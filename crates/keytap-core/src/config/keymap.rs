// Keytap Configuration - Key Action Maps
// Root maps bound to a device at grab time

use indexmap::IndexMap;

/// A named root key-action map.
///
/// This is configuration data only: it is handed to the resolver of every
/// device its grab rule captures, and the resolver decides what it means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyActionMap {
    name: String,
    remaps: IndexMap<u16, u16>,
}

impl KeyActionMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remaps: IndexMap::new(),
        }
    }

    pub fn with_remaps(name: impl Into<String>, remaps: IndexMap<u16, u16>) -> Self {
        Self {
            name: name.into(),
            remaps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output code bound to `code`, if any
    pub fn get(&self, code: u16) -> Option<u16> {
        self.remaps.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.remaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaps.is_empty()
    }
}
