//! Serves remapped copies of real artifacts under synthetic `remap.*` and
//! `remapped.*` groups.

use crate::dependency::{DependencyRequest, DependencyResolver};
use crate::error::{Error, Result};
use crate::mapping::{LazyMappingVersion, MappingVersion};
use crate::remap::Remapper;
use crate::repo::artifact::{ArtifactProvider, Provided, SyntheticArtifact};
use crate::repo::identifier::ArtifactIdentifier;
use crate::repo::pom::rewrite_group_id;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::sync::Arc;
use tracing::{debug, trace};

static LONG_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^remapped\.(?P<provider>[^.]+)\.(?P<channel>[^.]+)\.(?P<version>[^.]+)\.(?P<direction>[^.]+)\.(?P<group>.+)$",
    )
    .expect("valid long remap pattern")
});

static SHORT_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^remap\.(?P<direction>[^.]+)\.(?P<group>.+)$").expect("valid short remap pattern")
});

/// A synthetic remap group taken apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemapGroup {
    /// `remap.<direction>.<group>`: the configured mapping set.
    Short { direction: String, real_group: String },
    /// `remapped.<provider>.<channel>.<version>.<direction>.<group>`
    Long {
        provider: String,
        channel: String,
        version: String,
        direction: String,
        real_group: String,
    },
}

impl RemapGroup {
    pub fn parse(group: &str) -> Option<Self> {
        if let Some(caps) = LONG_FORM.captures(group) {
            return Some(RemapGroup::Long {
                provider: caps["provider"].to_string(),
                channel: caps["channel"].to_string(),
                version: caps["version"].to_string(),
                direction: caps["direction"].to_string(),
                real_group: caps["group"].to_string(),
            });
        }
        SHORT_FORM.captures(group).map(|caps| RemapGroup::Short {
            direction: caps["direction"].to_string(),
            real_group: caps["group"].to_string(),
        })
    }

    pub fn direction(&self) -> &str {
        match self {
            RemapGroup::Short { direction, .. } | RemapGroup::Long { direction, .. } => direction,
        }
    }

    pub fn real_group(&self) -> &str {
        match self {
            RemapGroup::Short { real_group, .. } | RemapGroup::Long { real_group, .. } => real_group,
        }
    }

    /// Mapping version to remap with. The short form takes everything but
    /// the direction from `defaults`.
    pub fn mapping_version(&self, defaults: &LazyMappingVersion, target_version: &str) -> MappingVersion {
        match self {
            RemapGroup::Short { direction, .. } => defaults.get().with_direction(direction.as_str()),
            RemapGroup::Long {
                provider,
                channel,
                version,
                direction,
                ..
            } => MappingVersion::new(
                provider.as_str(),
                channel.as_str(),
                version.as_str(),
                target_version,
                direction.as_str(),
            ),
        }
    }
}

pub struct RemappingArtifactProvider {
    resolver: Arc<DependencyResolver>,
    remapper: Arc<Remapper>,
    defaults: Arc<LazyMappingVersion>,
    target_version: String,
}

impl RemappingArtifactProvider {
    pub fn new(
        resolver: Arc<DependencyResolver>,
        remapper: Arc<Remapper>,
        defaults: Arc<LazyMappingVersion>,
        target_version: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            remapper,
            defaults,
            target_version: target_version.into(),
        }
    }
}

impl ArtifactProvider for RemappingArtifactProvider {
    fn name(&self) -> &str {
        "remapping"
    }

    fn provide(&self, identifier: &ArtifactIdentifier) -> Result<Provided> {
        let Some(group) = RemapGroup::parse(&identifier.group) else {
            trace!("{} is not a remap coordinate", identifier);
            return Ok(Provided::NotApplicable);
        };

        let real = identifier.with_group(group.real_group());
        let files = self
            .resolver
            .resolve(&DependencyRequest::Module(real.to_coordinate()))?;
        let Some(file) = files.into_iter().next() else {
            debug!("{} has no real artifact {}", identifier, real);
            return Ok(Provided::NotApplicable);
        };

        if identifier.is_pom() {
            let pom = fs::read_to_string(&file).map_err(|e| Error::io(&file, e))?;
            let rewritten = rewrite_group_id(&pom, &identifier.group)?;
            return Ok(Provided::Artifact(SyntheticArtifact::from_bytes(
                rewritten.into_bytes(),
            )));
        }

        let version = group.mapping_version(&self.defaults, &self.target_version);
        let remapper = self.remapper.clone();
        Ok(Provided::Artifact(SyntheticArtifact::lazy(move || {
            remapper.remap_bytes(&version, &file, &[])
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form() {
        let group = RemapGroup::parse("remap.srg-mcp.com.example").unwrap();
        assert_eq!(group.direction(), "srg-mcp");
        assert_eq!(group.real_group(), "com.example");
        assert!(matches!(group, RemapGroup::Short { .. }));
    }

    #[test]
    fn test_long_form() {
        let group = RemapGroup::parse("remapped.mcp.snapshot.20171003.notch-mcp.org.lib").unwrap();
        assert_eq!(
            group,
            RemapGroup::Long {
                provider: "mcp".into(),
                channel: "snapshot".into(),
                version: "20171003".into(),
                direction: "notch-mcp".into(),
                real_group: "org.lib".into(),
            }
        );
        let defaults = LazyMappingVersion::new(|| panic!("long form needs no defaults"));
        let version = group.mapping_version(&defaults, "1.12.2");
        assert_eq!(
            version,
            MappingVersion::new("mcp", "snapshot", "20171003", "1.12.2", "notch-mcp")
        );
    }

    #[test]
    fn test_short_form_uses_defaults() {
        let defaults = LazyMappingVersion::from(MappingVersion::new(
            "mcp", "stable", "39", "1.12.2", "notch-mcp",
        ));
        let version = RemapGroup::parse("remap.srg-mcp.com.example")
            .unwrap()
            .mapping_version(&defaults, "ignored");
        assert_eq!(version.direction, "srg-mcp");
        assert_eq!(version.channel, "stable");
        assert_eq!(version.target_version, "1.12.2");
    }

    #[test]
    fn test_other_groups_do_not_match() {
        assert_eq!(RemapGroup::parse("com.example"), None);
        assert_eq!(RemapGroup::parse("remap.srg-mcp"), None);
        assert_eq!(RemapGroup::parse("remapped.mcp.snapshot"), None);
    }
}
