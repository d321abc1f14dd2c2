//! The unit-wide data section, merged from every method.

use indexmap::IndexMap;

use cilow_asm::DataEntry;

/// Data entries keyed by name, in first-insertion order.
#[derive(Clone, Debug, Default)]
pub struct VariableTable {
    entries: IndexMap<String, DataEntry>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; re-adding an identical entry is a no-op.
    ///
    /// Returns the name back when it is already taken by a different entry.
    pub fn insert(&mut self, entry: DataEntry) -> Result<(), String> {
        match self.entries.get(&entry.name) {
            Some(existing) if *existing == entry => Ok(()),
            Some(_) => Err(entry.name),
            None => {
                self.entries.insert(entry.name.clone(), entry);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&DataEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<DataEntry> {
        self.entries.into_values().collect()
    }
}
