//! Renaming tables.
//!
//! [`MappingTable`] is the flat, directional output of a provider: one value
//! per key, iteration in emission order. [`BiTable`] is the bijective index
//! providers build while parsing, with an O(1) inverse.

use crate::error::{Error, Result};
use crate::mapping::entry::{EntryKind, MappingEntry};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: IndexMap<MappingEntry, MappingEntry>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `from -> to`. Both sides must be the same kind of symbol. A key
    /// may be repeated only with the value it already has.
    pub fn insert(&mut self, from: MappingEntry, to: MappingEntry) -> Result<()> {
        if from.kind() != to.kind() {
            return Err(Error::parse(
                "mapping table",
                None,
                format!("{} {} cannot map to {} {}", from.kind(), from, to.kind(), to),
            ));
        }
        match self.entries.get(&from) {
            Some(existing) if *existing == to => Ok(()),
            Some(existing) => Err(Error::parse(
                "mapping table",
                None,
                format!("conflicting targets for {}: {} and {}", from, existing, to),
            )),
            None => {
                self.entries.insert(from, to);
                Ok(())
            }
        }
    }

    /// Appends every pair of `other`, with the same conflict rules as [`insert`](Self::insert).
    pub fn extend_from(&mut self, other: &MappingTable) -> Result<()> {
        for (from, to) in other.iter() {
            self.insert(from.clone(), to.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, from: &MappingEntry) -> Option<&MappingEntry> {
        self.entries.get(from)
    }

    /// Target of `from`, or `from` itself when the table does not rename it.
    pub fn map<'a>(&'a self, from: &'a MappingEntry) -> &'a MappingEntry {
        self.entries.get(from).unwrap_or(from)
    }

    pub fn contains(&self, from: &MappingEntry) -> bool {
        self.entries.contains_key(from)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MappingEntry, &MappingEntry)> + '_ {
        self.entries.iter()
    }

    pub fn count_kind(&self, kind: EntryKind) -> usize {
        self.entries.keys().filter(|k| k.kind() == kind).count()
    }

    /// Chains two tables: every key of `self` maps to `next`'s image of its
    /// value. Values `next` does not rename pass through unchanged, so the
    /// result covers exactly the domain of `self`.
    pub fn then(&self, next: &MappingTable) -> MappingTable {
        let entries = self
            .entries
            .iter()
            .map(|(from, via)| (from.clone(), next.map(via).clone()))
            .collect();
        MappingTable { entries }
    }
}

impl<'a> IntoIterator for &'a MappingTable {
    type Item = (&'a MappingEntry, &'a MappingEntry);
    type IntoIter = indexmap::map::Iter<'a, MappingEntry, MappingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Bijective index between two naming schemes.
#[derive(Debug, Clone, Default)]
pub struct BiTable {
    forward: IndexMap<MappingEntry, MappingEntry>,
    inverse: IndexMap<MappingEntry, MappingEntry>,
}

impl BiTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `from <-> to`. Re-adding an identical pair is a no-op; binding a
    /// key or a value a second time to something else is an error.
    pub fn insert(&mut self, from: MappingEntry, to: MappingEntry) -> Result<()> {
        if let Some(existing) = self.forward.get(&from) {
            if *existing == to {
                return Ok(());
            }
            return Err(Error::parse(
                "bijective table",
                None,
                format!("{} is mapped to both {} and {}", from, existing, to),
            ));
        }
        if let Some(existing) = self.inverse.get(&to) {
            return Err(Error::parse(
                "bijective table",
                None,
                format!("{} and {} are both mapped to {}", existing, from, to),
            ));
        }
        self.forward.insert(from.clone(), to.clone());
        self.inverse.insert(to, from);
        Ok(())
    }

    pub fn get(&self, from: &MappingEntry) -> Option<&MappingEntry> {
        self.forward.get(from)
    }

    pub fn get_inverse(&self, to: &MappingEntry) -> Option<&MappingEntry> {
        self.inverse.get(to)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MappingEntry, &MappingEntry)> + '_ {
        self.forward.iter()
    }

    pub fn iter_inverse(&self) -> impl Iterator<Item = (&MappingEntry, &MappingEntry)> + '_ {
        self.inverse.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &MappingEntry> + '_ {
        self.forward.values()
    }
}
