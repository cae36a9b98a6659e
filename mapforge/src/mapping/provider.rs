//! Capability interface implemented by every mapping source.

use crate::dependency::DependencyRequest;
use crate::error::{Error, Result};
use crate::mapping::table::MappingTable;
use crate::mapping::version::MappingVersion;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A named source of renaming tables.
///
/// Providers declare the dependencies they need for a version as opaque
/// handles; the caller resolves them and passes the local files back to
/// [`mapping`](MappingProvider::mapping).
pub trait MappingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Directions this provider can produce, e.g. `notch-srg`.
    fn supported_directions(&self) -> &[&str];

    fn supports(&self, direction: &str) -> bool {
        self.supported_directions().contains(&direction)
    }

    /// Repositories the provider's dependencies are published to.
    fn repositories(&self) -> Vec<String> {
        Vec::new()
    }

    fn dependencies(&self, version: &MappingVersion) -> Vec<(&'static str, DependencyRequest)>;

    /// Builds the flat table for `version.direction`. Must either return a
    /// complete table or fail; partial tables are never returned.
    fn mapping(&self, version: &MappingVersion, dependencies: &ResolvedDependencies)
        -> Result<MappingTable>;
}

/// Local files for a provider's dependency handles.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencies {
    files: HashMap<&'static str, PathBuf>,
}

impl ResolvedDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: &'static str, path: PathBuf) {
        self.files.insert(handle, path);
    }

    pub fn get(&self, handle: &str) -> Result<&Path> {
        self.files.get(handle).map(PathBuf::as_path).ok_or_else(|| {
            Error::parse(
                "provider dependencies",
                None,
                format!("dependency '{}' was not resolved", handle),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<(&'static str, PathBuf)> for ResolvedDependencies {
    fn from_iter<T: IntoIterator<Item = (&'static str, PathBuf)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}
