//! Serves generated mapping tables as `mapping.<provider>` maven artifacts.

use crate::error::{Error, Result};
use crate::mapping::version::mapping_group_provider;
use crate::mapping::{MappingManager, MappingVersion, MAPPING_EXTENSION};
use crate::repo::artifact::{ArtifactProvider, Provided, SyntheticArtifact};
use crate::repo::identifier::ArtifactIdentifier;
use crate::repo::pom::PomBuilder;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct MappingArtifactProvider {
    manager: Arc<MappingManager>,
    target_version: String,
}

impl MappingArtifactProvider {
    pub fn new(manager: Arc<MappingManager>, target_version: impl Into<String>) -> Self {
        Self {
            manager,
            target_version: target_version.into(),
        }
    }

    fn mapping(&self, identifier: &ArtifactIdentifier) -> Result<Provided> {
        let Some(version) = MappingVersion::from_artifact(identifier, &self.target_version) else {
            trace!("{} is not a mapping coordinate", identifier);
            return Ok(Provided::NotApplicable);
        };
        if !self.manager.is_registered(&version.provider) {
            debug!("No mapping provider named {}", version.provider);
            return Ok(Provided::NotApplicable);
        }
        let provider = self.manager.provider(&version.provider)?;
        if !provider.supports(&version.direction) {
            return Err(Error::UnsupportedDirection {
                provider: version.provider,
                direction: version.direction,
            });
        }

        let manager = self.manager.clone();
        Ok(Provided::Artifact(SyntheticArtifact::lazy(move || {
            manager.mapping_bytes(&version)
        })))
    }

    fn pom(&self, identifier: &ArtifactIdentifier) -> Result<Provided> {
        let registered = mapping_group_provider(&identifier.group)
            .map_or(false, |provider| self.manager.is_registered(provider));
        if !registered {
            return Ok(Provided::NotApplicable);
        }
        let pom = PomBuilder::new(
            identifier.group.as_str(),
            identifier.name.as_str(),
            identifier.version.as_str(),
        )
        .description(identifier.name.as_str())
        .build()?;
        Ok(Provided::Artifact(SyntheticArtifact::from_bytes(pom.into_bytes())))
    }
}

impl ArtifactProvider for MappingArtifactProvider {
    fn name(&self) -> &str {
        "mappings"
    }

    fn provide(&self, identifier: &ArtifactIdentifier) -> Result<Provided> {
        match identifier.extension.as_str() {
            MAPPING_EXTENSION => self.mapping(identifier),
            "pom" => self.pom(identifier),
            _ => Ok(Provided::NotApplicable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{ArtifactFetcher, Coordinate, DependencyResolver};
    use crate::error::BoxError;
    use crate::mapping::McpMappingProvider;
    use std::path::PathBuf;

    struct NoFetch;

    impl ArtifactFetcher for NoFetch {
        fn fetch(&self, _: &Coordinate) -> std::result::Result<Vec<PathBuf>, BoxError> {
            Ok(Vec::new())
        }
    }

    fn provider(dir: &std::path::Path) -> MappingArtifactProvider {
        let resolver = Arc::new(DependencyResolver::new(Arc::new(NoFetch)));
        let manager = Arc::new(MappingManager::new(dir, resolver));
        manager.register(Arc::new(McpMappingProvider::new()));
        MappingArtifactProvider::new(manager, "1.12.2")
    }

    #[test]
    fn test_foreign_coordinates_are_not_applicable() {
        let dir = tempfile::tempdir().unwrap();
        let repo = provider(dir.path());

        let jar = ArtifactIdentifier::new("com.example", "lib", "1.0");
        assert!(!repo.provide(&jar).unwrap().is_applicable());

        let unknown = ArtifactIdentifier::new("mapping.yarn", "stable", "1")
            .with_classifier("notch-srg")
            .with_extension("srg");
        assert!(!repo.provide(&unknown).unwrap().is_applicable());

        let pom = ArtifactIdentifier::new("com.example", "lib", "1.0").with_extension("pom");
        assert!(!repo.provide(&pom).unwrap().is_applicable());
    }

    #[test]
    fn test_unsupported_direction_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = provider(dir.path());
        let id = ArtifactIdentifier::new("mapping.mcp", "snapshot", "20171003")
            .with_classifier("notch-yarn")
            .with_extension("srg");
        assert!(matches!(
            repo.provide(&id),
            Err(Error::UnsupportedDirection { .. })
        ));
    }

    #[test]
    fn test_mapping_content_is_deferred() {
        let dir = tempfile::tempdir().unwrap();
        let repo = provider(dir.path());
        let id = ArtifactIdentifier::new("mapping.mcp", "snapshot", "20171003")
            .with_classifier("notch-mcp")
            .with_extension("srg");
        let artifact = repo.provide(&id).unwrap().into_artifact().unwrap();
        assert!(!artifact.is_materialized());
        // Nothing can be fetched, so producing the bytes fails.
        assert!(artifact.bytes().is_err());
    }

    #[test]
    fn test_pom_for_mapping_group() {
        let dir = tempfile::tempdir().unwrap();
        let repo = provider(dir.path());
        let id = ArtifactIdentifier::new("mapping.mcp", "snapshot", "20171003").with_extension("pom");
        let artifact = repo.provide(&id).unwrap().into_artifact().unwrap();
        let pom = String::from_utf8(artifact.bytes().unwrap().to_vec()).unwrap();
        assert!(pom.contains("<groupId>mapping.mcp</groupId>"));
        assert!(pom.contains("<artifactId>snapshot</artifactId>"));
    }
}
