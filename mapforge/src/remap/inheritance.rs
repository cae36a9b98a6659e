//! Type hierarchy lookups used to resolve inherited members.

use crate::error::{Error, Result};
use crate::remap::classfile::{ClassFile, ClassFormatError};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub trait InheritanceProvider: Send + Sync {
    /// Direct supertypes of `class` (superclass first, then interfaces), or
    /// `None` when the class is unknown to this provider.
    fn parents(&self, class: &str) -> Option<Vec<String>>;
}

/// Hierarchy of the classes inside one archive.
#[derive(Debug, Default, Clone)]
pub struct ArchiveInheritance {
    parents: HashMap<String, Vec<String>>,
}

impl ArchiveInheritance {
    pub fn from_classes<'a>(classes: impl IntoIterator<Item = &'a ClassFile>) -> Self {
        let mut inheritance = Self::default();
        for class in classes {
            if let Err(e) = inheritance.add(class) {
                warn!("Ignoring class with unreadable hierarchy: {}", e);
            }
        }
        inheritance
    }

    /// Reads every `.class` entry of a jar. Entries that do not parse are
    /// skipped; an unreadable archive is an error.
    pub fn from_archive(path: &Path) -> Result<Self> {
        let archive_err = |message: String| Error::Archive {
            path: path.to_path_buf(),
            message,
        };
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_err(e.to_string()))?;

        let mut inheritance = Self::default();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| archive_err(e.to_string()))?;
            if entry.is_dir() || !entry.name().ends_with(".class") {
                continue;
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| archive_err(e.to_string()))?;
            let added = ClassFile::parse(&bytes).and_then(|class| inheritance.add(&class));
            if let Err(e) = added {
                debug!("Skipping {} in {}: {}", entry.name(), path.display(), e);
            }
        }
        debug!(
            "Loaded hierarchy of {} classes from {}",
            inheritance.len(),
            path.display()
        );
        Ok(inheritance)
    }

    fn add(&mut self, class: &ClassFile) -> std::result::Result<(), ClassFormatError> {
        let mut parents = Vec::new();
        if let Some(super_name) = class.super_name()? {
            parents.push(super_name.to_string());
        }
        for interface in class.interface_names()? {
            parents.push(interface.to_string());
        }
        self.parents.insert(class.this_name()?.to_string(), parents);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl InheritanceProvider for ArchiveInheritance {
    fn parents(&self, class: &str) -> Option<Vec<String>> {
        self.parents.get(class).cloned()
    }
}

/// Asks each provider in order; the first one that knows the class answers.
#[derive(Default, Clone)]
pub struct JointInheritance {
    providers: Vec<Arc<dyn InheritanceProvider>>,
}

impl JointInheritance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, provider: Arc<dyn InheritanceProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl InheritanceProvider for JointInheritance {
    fn parents(&self, class: &str) -> Option<Vec<String>> {
        self.providers.iter().find_map(|p| p.parents(class))
    }
}
