//! Symbol identities used as keys and values of mapping tables.

use std::fmt;

/// A package, class, field or method symbol. Names use internal form
/// (`net/minecraft/Foo`); method descriptors use JVM syntax (`(I)V`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MappingEntry {
    Package {
        name: String,
    },
    Class {
        name: String,
    },
    Field {
        owner: String,
        name: String,
    },
    Method {
        owner: String,
        name: String,
        descriptor: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Package,
    Class,
    Field,
    Method,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryKind::Package => "package",
            EntryKind::Class => "class",
            EntryKind::Field => "field",
            EntryKind::Method => "method",
        };
        f.write_str(s)
    }
}

impl MappingEntry {
    pub fn package(name: impl Into<String>) -> Self {
        MappingEntry::Package { name: name.into() }
    }

    pub fn class(name: impl Into<String>) -> Self {
        MappingEntry::Class { name: name.into() }
    }

    pub fn field(owner: impl Into<String>, name: impl Into<String>) -> Self {
        MappingEntry::Field {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn method(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        MappingEntry::Method {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Builds a field from `owner/name`, splitting at the last `/`.
    pub fn qualified_field(qualified: &str) -> Option<Self> {
        let (owner, name) = split_qualified(qualified)?;
        Some(Self::field(owner, name))
    }

    /// Builds a method from `owner/name` plus its descriptor.
    pub fn qualified_method(qualified: &str, descriptor: &str) -> Option<Self> {
        let (owner, name) = split_qualified(qualified)?;
        Some(Self::method(owner, name, descriptor))
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            MappingEntry::Package { .. } => EntryKind::Package,
            MappingEntry::Class { .. } => EntryKind::Class,
            MappingEntry::Field { .. } => EntryKind::Field,
            MappingEntry::Method { .. } => EntryKind::Method,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MappingEntry::Package { name }
            | MappingEntry::Class { name }
            | MappingEntry::Field { name, .. }
            | MappingEntry::Method { name, .. } => name,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            MappingEntry::Field { owner, .. } | MappingEntry::Method { owner, .. } => Some(owner),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> Option<&str> {
        match self {
            MappingEntry::Method { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }

    /// Same symbol with a different simple name; owner and descriptor are kept.
    pub fn renamed(&self, new_name: impl Into<String>) -> Self {
        let name = new_name.into();
        match self {
            MappingEntry::Package { .. } => MappingEntry::Package { name },
            MappingEntry::Class { .. } => MappingEntry::Class { name },
            MappingEntry::Field { owner, .. } => MappingEntry::Field {
                owner: owner.clone(),
                name,
            },
            MappingEntry::Method {
                owner, descriptor, ..
            } => MappingEntry::Method {
                owner: owner.clone(),
                name,
                descriptor: descriptor.clone(),
            },
        }
    }
}

impl fmt::Display for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingEntry::Package { name } | MappingEntry::Class { name } => f.write_str(name),
            MappingEntry::Field { owner, name } => write!(f, "{}/{}", owner, name),
            MappingEntry::Method {
                owner,
                name,
                descriptor,
            } => write!(f, "{}/{} {}", owner, name, descriptor),
        }
    }
}

fn split_qualified(qualified: &str) -> Option<(&str, &str)> {
    let idx = qualified.rfind('/')?;
    let (owner, name) = (&qualified[..idx], &qualified[idx + 1..]);
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_qualified_names_split_at_last_slash() {
        let field = MappingEntry::qualified_field("net/minecraft/Foo/bar").unwrap();
        assert_eq!(field, MappingEntry::field("net/minecraft/Foo", "bar"));

        let method = MappingEntry::qualified_method("a/b", "(I)V").unwrap();
        assert_eq!(method.owner(), Some("a"));
        assert_eq!(method.name(), "b");
        assert_eq!(method.descriptor(), Some("(I)V"));
    }

    #[test]
    fn test_unqualified_names_are_rejected() {
        assert!(MappingEntry::qualified_field("noslash").is_none());
        assert!(MappingEntry::qualified_field("trailing/").is_none());
        assert!(MappingEntry::qualified_method("/lead", "()V").is_none());
    }

    #[test]
    fn test_equality_uses_every_field() {
        let a = MappingEntry::method("a", "b", "()V");
        let b = MappingEntry::method("a", "b", "(I)V");
        assert_ne!(a, b);
        // same name, different kind
        assert_ne!(MappingEntry::class("a"), MappingEntry::package("a"));

        let set: HashSet<_> = [a.clone(), a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_renamed_keeps_owner_and_descriptor() {
        let m = MappingEntry::method("a", "b", "()V").renamed("tick");
        assert_eq!(m, MappingEntry::method("a", "tick", "()V"));
        assert_eq!(m.kind(), EntryKind::Method);
    }
}
