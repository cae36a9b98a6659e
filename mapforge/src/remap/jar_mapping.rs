//! Composite renaming table consumed by rewrite engines.

use crate::error::{Error, Result};
use crate::mapping::entry::MappingEntry;
use crate::mapping::srg;
use crate::remap::inheritance::InheritanceProvider;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Name used in `PK:` records for the unnamed package.
const DEFAULT_PACKAGE: &str = ".";

/// Renames loaded from one or more mapping files, plus an optional
/// hierarchy used to find members declared on supertypes.
#[derive(Default, Clone)]
pub struct JarMapping {
    packages: HashMap<String, String>,
    classes: HashMap<String, String>,
    /// owner -> field name -> new name
    fields: HashMap<String, HashMap<String, String>>,
    /// owner -> name + descriptor -> new name
    methods: HashMap<String, HashMap<String, String>>,
    inheritance: Option<Arc<dyn InheritanceProvider>>,
}

impl fmt::Debug for JarMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JarMapping")
            .field("packages", &self.packages.len())
            .field("classes", &self.classes.len())
            .field("fields", &self.fields.values().map(HashMap::len).sum::<usize>())
            .field("methods", &self.methods.values().map(HashMap::len).sum::<usize>())
            .field("inheritance", &self.inheritance.is_some())
            .finish()
    }
}

fn bind(
    map: &mut HashMap<String, String>,
    key: &str,
    value: &str,
    what: &dyn fmt::Display,
) -> std::result::Result<(), String> {
    match map.get(key) {
        Some(existing) if existing != value => Err(format!(
            "{} is already mapped to {}, cannot map it to {}",
            what, existing, value
        )),
        Some(_) => Ok(()),
        None => {
            map.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }
}

impl JarMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every record of a mapping file. Records repeating an existing
    /// rename are accepted; records contradicting one are a parse error.
    pub fn load_mappings(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let source_name = path.display().to_string();
        for (idx, line) in text.lines().enumerate() {
            if let Some((from, to)) = srg::parse_record(line, idx + 1, &source_name)? {
                self.add(&from, &to)
                    .map_err(|message| Error::parse(&source_name, Some(idx + 1), message))?;
            }
        }
        Ok(())
    }

    /// Adds one rename pair.
    pub fn add(&mut self, from: &MappingEntry, to: &MappingEntry) -> std::result::Result<(), String> {
        match (from, to) {
            (MappingEntry::Package { name: a }, MappingEntry::Package { name: b }) => {
                bind(&mut self.packages, a, b, from)
            }
            (MappingEntry::Class { name: a }, MappingEntry::Class { name: b }) => {
                bind(&mut self.classes, a, b, from)
            }
            (MappingEntry::Field { owner, name }, MappingEntry::Field { name: new, .. }) => bind(
                self.fields.entry(owner.clone()).or_default(),
                name,
                new,
                from,
            ),
            (
                MappingEntry::Method {
                    owner,
                    name,
                    descriptor,
                },
                MappingEntry::Method { name: new, .. },
            ) => bind(
                self.methods.entry(owner.clone()).or_default(),
                &format!("{}{}", name, descriptor),
                new,
                from,
            ),
            _ => Err(format!("{} and {} are different kinds of symbol", from, to)),
        }
    }

    /// Hierarchy consulted when a member is not mapped on its literal owner.
    pub fn set_fallback_inheritance(&mut self, provider: Arc<dyn InheritanceProvider>) {
        self.inheritance = Some(provider);
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Renamed class, in internal form. Inner classes follow their outer
    /// class; classes without a record move with their package.
    pub fn map_class(&self, name: &str) -> String {
        if let Some(mapped) = self.classes.get(name) {
            return mapped.clone();
        }
        if let Some((outer, inner)) = name.rsplit_once('$') {
            if !outer.is_empty() {
                let mapped_outer = self.map_class(outer);
                if mapped_outer != outer {
                    return format!("{}${}", mapped_outer, inner);
                }
            }
        }
        let (package, simple) = match name.rsplit_once('/') {
            Some((package, simple)) => (package, simple),
            None => (DEFAULT_PACKAGE, name),
        };
        match self.packages.get(package) {
            Some(target) if target == DEFAULT_PACKAGE => simple.to_string(),
            Some(target) => format!("{}/{}", target, simple),
            None => name.to_string(),
        }
    }

    /// Rewrites every `L<class>;` of a field or method descriptor.
    pub fn map_descriptor(&self, descriptor: &str) -> String {
        let mut out = String::with_capacity(descriptor.len());
        let mut rest = descriptor;
        while let Some(start) = rest.find('L') {
            out.push_str(&rest[..=start]);
            let after = &rest[start + 1..];
            match after.find(';') {
                Some(end) => {
                    out.push_str(&self.map_class(&after[..end]));
                    out.push(';');
                    rest = &after[end + 1..];
                }
                None => {
                    rest = after;
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Maps a `Class` constant's name, which is either a class or an array descriptor.
    pub fn map_class_constant(&self, name: &str) -> String {
        if name.starts_with('[') {
            self.map_descriptor(name)
        } else {
            self.map_class(name)
        }
    }

    /// New name of field `name` referenced through `owner`, searching supertypes.
    pub fn map_field(&self, owner: &str, name: &str) -> String {
        self.find_member(owner, |class| self.fields.get(class)?.get(name))
            .unwrap_or_else(|| name.to_string())
    }

    pub fn map_method(&self, owner: &str, name: &str, descriptor: &str) -> String {
        if name.starts_with('<') {
            return name.to_string();
        }
        let key = format!("{}{}", name, descriptor);
        self.find_member(owner, |class| self.methods.get(class)?.get(&key))
            .unwrap_or_else(|| name.to_string())
    }

    /// New name of a field declared by `owner`. Fields are not virtual, so a
    /// field shadowing a mapped one in a supertype keeps its own name.
    pub fn map_declared_field(&self, owner: &str, name: &str) -> String {
        self.fields
            .get(owner)
            .and_then(|fields| fields.get(name))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// New name of a method declared by `owner`. Only overridable methods
    /// follow a mapped supertype method; private and static ones resolve
    /// against `owner` alone.
    pub fn map_declared_method(&self, owner: &str, name: &str, descriptor: &str, overridable: bool) -> String {
        if overridable {
            return self.map_method(owner, name, descriptor);
        }
        self.methods
            .get(owner)
            .and_then(|methods| methods.get(&format!("{}{}", name, descriptor)))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn find_member<'a>(
        &'a self,
        owner: &str,
        lookup: impl Fn(&str) -> Option<&'a String>,
    ) -> Option<String> {
        let mut queue = VecDeque::from([owner.to_string()]);
        let mut seen = HashSet::new();
        while let Some(class) = queue.pop_front() {
            if let Some(found) = lookup(&class) {
                return Some(found.clone());
            }
            let parents = match &self.inheritance {
                Some(inheritance) => inheritance.parents(&class),
                None => None,
            };
            seen.insert(class);
            for parent in parents.into_iter().flatten() {
                if !seen.contains(&parent) {
                    queue.push_back(parent);
                }
            }
        }
        None
    }
}
