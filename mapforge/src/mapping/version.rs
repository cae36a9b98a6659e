//! Mapping version tuple and its deferred variant.

use crate::repo::ArtifactIdentifier;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extension of generated mapping files, both on disk and as maven artifacts.
pub const MAPPING_EXTENSION: &str = "srg";

/// Identifies exactly one renaming table: which provider, which published
/// mapping set, which target platform version and which direction
/// (e.g. `notch-mcp`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingVersion {
    pub provider: String,
    pub channel: String,
    pub version: String,
    pub target_version: String,
    pub direction: String,
}

impl MappingVersion {
    pub fn new(
        provider: impl Into<String>,
        channel: impl Into<String>,
        version: impl Into<String>,
        target_version: impl Into<String>,
        direction: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            channel: channel.into(),
            version: version.into(),
            target_version: target_version.into(),
            direction: direction.into(),
        }
    }

    /// Same mapping set, another direction.
    pub fn with_direction(&self, direction: impl Into<String>) -> Self {
        Self {
            direction: direction.into(),
            ..self.clone()
        }
    }

    /// `mapping.<provider>:<channel>:<version>:<direction>@srg`
    pub fn as_maven_coordinate(&self) -> String {
        format!(
            "mapping.{}:{}:{}:{}@{}",
            self.provider, self.channel, self.version, self.direction, MAPPING_EXTENSION
        )
    }

    /// Decodes a synthetic mapping artifact. The target version is not part
    /// of the coordinate and comes from the caller.
    pub fn from_artifact(identifier: &ArtifactIdentifier, target_version: &str) -> Option<Self> {
        if identifier.extension != MAPPING_EXTENSION {
            return None;
        }
        let provider = mapping_group_provider(&identifier.group)?;
        let direction = identifier.classifier.as_deref()?;
        Some(Self::new(
            provider,
            identifier.name.as_str(),
            identifier.version.as_str(),
            target_version,
            direction,
        ))
    }
}

/// Provider name of a `mapping.<provider>` group; `None` for any other group.
pub fn mapping_group_provider(group: &str) -> Option<&str> {
    let provider = group.strip_prefix("mapping.")?;
    if provider.is_empty() || provider.contains('.') {
        return None;
    }
    Some(provider)
}

impl fmt::Display for MappingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}_{}@{}[{}]",
            self.provider, self.channel, self.version, self.target_version, self.direction
        )
    }
}

/// A mapping version computed on first use and memoized afterwards, for
/// callers that are constructed before the concrete version is known.
pub struct LazyMappingVersion {
    supplier: Box<dyn Fn() -> MappingVersion + Send + Sync>,
    resolved: OnceCell<MappingVersion>,
}

impl LazyMappingVersion {
    pub fn new<F>(supplier: F) -> Self
    where
        F: Fn() -> MappingVersion + Send + Sync + 'static,
    {
        Self {
            supplier: Box::new(supplier),
            resolved: OnceCell::new(),
        }
    }

    /// Already-known version; the supplier is never consulted.
    pub fn resolved(version: MappingVersion) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(version.clone());
        Self {
            supplier: Box::new(move || version.clone()),
            resolved: cell,
        }
    }

    pub fn get(&self) -> &MappingVersion {
        self.resolved.get_or_init(|| (self.supplier)())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

impl From<MappingVersion> for LazyMappingVersion {
    fn from(version: MappingVersion) -> Self {
        Self::resolved(version)
    }
}

impl PartialEq for LazyMappingVersion {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for LazyMappingVersion {}

impl PartialEq<MappingVersion> for LazyMappingVersion {
    fn eq(&self, other: &MappingVersion) -> bool {
        self.get() == other
    }
}

impl fmt::Debug for LazyMappingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolved.get() {
            Some(v) => f.debug_tuple("LazyMappingVersion").field(v).finish(),
            None => f.write_str("LazyMappingVersion(<unresolved>)"),
        }
    }
}

impl fmt::Display for LazyMappingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.get(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample() -> MappingVersion {
        MappingVersion::new("mcp", "snapshot", "20171003", "1.12.2", "notch-mcp")
    }

    #[test]
    fn test_maven_coordinate_round_trip() {
        let version = sample();
        assert_eq!(
            version.as_maven_coordinate(),
            "mapping.mcp:snapshot:20171003:notch-mcp@srg"
        );

        let id = ArtifactIdentifier::new("mapping.mcp", "snapshot", "20171003")
            .with_classifier("notch-mcp")
            .with_extension("srg");
        assert_eq!(MappingVersion::from_artifact(&id, "1.12.2"), Some(version));
    }

    #[test]
    fn test_from_artifact_rejects_foreign_coordinates() {
        let nested = ArtifactIdentifier::new("mapping.mcp.extra", "snapshot", "1")
            .with_classifier("notch-mcp")
            .with_extension("srg");
        assert_eq!(MappingVersion::from_artifact(&nested, "1.12.2"), None);

        let wrong_ext = ArtifactIdentifier::new("mapping.mcp", "snapshot", "1")
            .with_classifier("notch-mcp")
            .with_extension("jar");
        assert_eq!(MappingVersion::from_artifact(&wrong_ext, "1.12.2"), None);

        let no_classifier =
            ArtifactIdentifier::new("mapping.mcp", "snapshot", "1").with_extension("srg");
        assert_eq!(MappingVersion::from_artifact(&no_classifier, "1.12.2"), None);
    }

    #[test]
    fn test_lazy_version_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = LazyMappingVersion::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            sample()
        });

        assert!(!lazy.is_resolved());
        assert_eq!(lazy.get().provider, "mcp");
        assert_eq!(lazy.get().direction, "notch-mcp");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_equality_uses_resolved_values() {
        let a = LazyMappingVersion::new(sample);
        let b = LazyMappingVersion::from(sample());
        assert_eq!(a, b);
        assert_eq!(a, sample());
        assert_ne!(a, LazyMappingVersion::from(sample().with_direction("srg-mcp")));
    }
}
