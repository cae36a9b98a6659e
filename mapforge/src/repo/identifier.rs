//! Artifact identifiers and maven repository paths.

use crate::dependency::Coordinate;
use std::fmt;

/// One file of a maven module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactIdentifier {
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl ArtifactIdentifier {
    /// A `jar` without classifier.
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
            classifier: None,
            extension: "jar".to_string(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_group(&self, group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..self.clone()
        }
    }

    /// Parses `/<group path>/<name>/<version>/<name>-<version>[-<classifier>].<ext>`.
    /// The file name must repeat the directory's name and version.
    pub fn from_path(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        if segments.len() < 4 || segments.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
            return None;
        }
        let n = segments.len();
        let (file, version, name) = (segments[n - 1], segments[n - 2], segments[n - 3]);
        let group = segments[..n - 3].join(".");

        let rest = file.strip_prefix(name)?.strip_prefix('-')?.strip_prefix(version)?;
        let (classifier, extension) = if let Some(tail) = rest.strip_prefix('-') {
            let (classifier, extension) = tail.split_once('.')?;
            (Some(classifier), extension)
        } else {
            (None, rest.strip_prefix('.')?)
        };
        if classifier.map_or(false, str::is_empty) || extension.is_empty() {
            return None;
        }

        Some(Self {
            group,
            name: name.to_string(),
            version: version.to_string(),
            classifier: classifier.map(str::to_string),
            extension: extension.to_string(),
        })
    }

    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.name, self.version, c, self.extension),
            None => format!("{}-{}.{}", self.name, self.version, self.extension),
        }
    }

    /// Repository path with a leading `/`.
    pub fn to_path(&self) -> String {
        format!(
            "/{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.name,
            self.version,
            self.file_name()
        )
    }

    pub fn to_coordinate(&self) -> Coordinate {
        let coordinate = Coordinate::new(&self.group, &self.name, &self.version)
            .with_extension(self.extension.as_str());
        match &self.classifier {
            Some(c) => coordinate.with_classifier(c.as_str()),
            None => coordinate,
        }
    }

    pub fn is_pom(&self) -> bool {
        self.extension == "pom"
    }
}

impl fmt::Display for ArtifactIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        write!(f, "@{}", self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let id = ArtifactIdentifier::from_path(
            "/remap/srg-mcp/com/example/lib/1.0/lib-1.0-sources.jar",
        )
        .unwrap();
        assert_eq!(id.group, "remap.srg-mcp.com.example");
        assert_eq!(id.name, "lib");
        assert_eq!(id.version, "1.0");
        assert_eq!(id.classifier.as_deref(), Some("sources"));
        assert_eq!(id.extension, "jar");

        let pom = ArtifactIdentifier::from_path("/net/minecraft/minecraft/1.12.2/minecraft-1.12.2.pom")
            .unwrap();
        assert_eq!(pom.classifier, None);
        assert!(pom.is_pom());
        assert_eq!(pom.to_path(), "/net/minecraft/minecraft/1.12.2/minecraft-1.12.2.pom");

        let checksum = ArtifactIdentifier::from_path("/g/n/1/n-1.jar.sha1").unwrap();
        assert_eq!(checksum.extension, "jar.sha1");
    }

    #[test]
    fn test_from_path_requires_matching_file_name() {
        assert!(ArtifactIdentifier::from_path("/g/n/1/other-1.jar").is_none());
        assert!(ArtifactIdentifier::from_path("/g/n/1/n-2.jar").is_none());
        assert!(ArtifactIdentifier::from_path("/n/1/n-1.jar").is_none());
        assert!(ArtifactIdentifier::from_path("/g/n/1/n-1").is_none());
    }

    #[test]
    fn test_round_trip_through_coordinate() {
        let id = ArtifactIdentifier::new("mapping.mcp", "snapshot", "20171003")
            .with_classifier("notch-mcp")
            .with_extension("srg");
        assert_eq!(
            id.to_coordinate().key(),
            "mapping.mcp:snapshot:20171003:notch-mcp@srg"
        );
        assert_eq!(id.to_string(), id.to_coordinate().key());
    }
}
