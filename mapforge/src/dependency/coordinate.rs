//! Abstract artifact coordinates and resolution requests.

use itertools::Itertools;
use std::fmt;
use std::path::PathBuf;

/// `group:name:version[:classifier][@extension]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: Option<String>,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
            classifier: None,
            extension: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Parses the gradle-style notation. Returns `None` when fewer than three
    /// segments are present or any of them is empty.
    pub fn parse(notation: &str) -> Option<Self> {
        let (body, extension) = match notation.split_once('@') {
            Some((body, ext)) if !ext.is_empty() => (body, Some(ext.to_string())),
            Some(_) => return None,
            None => (notation, None),
        };
        let parts: Vec<&str> = body.split(':').collect();
        if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(Self {
            group: parts[0].to_string(),
            name: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|c| c.to_string()),
            extension,
        })
    }

    /// Stable single-flight key; optional parts appear only when set.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Extension, defaulting to `jar` like maven does.
    pub fn extension_or_default(&self) -> &str {
        self.extension.as_deref().unwrap_or("jar")
    }

    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.name,
                self.version,
                classifier,
                self.extension_or_default()
            ),
            None => format!(
                "{}-{}.{}",
                self.name,
                self.version,
                self.extension_or_default()
            ),
        }
    }

    /// Maven repository layout, `/`-separated and without a leading slash.
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.name,
            self.version,
            self.file_name()
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        if let Some(extension) = &self.extension {
            write!(f, "@{}", extension)?;
        }
        Ok(())
    }
}

/// What a caller hands to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRequest {
    /// Already local; returned as-is without fetching.
    Files(Vec<PathBuf>),
    Module(Coordinate),
}

impl From<Coordinate> for DependencyRequest {
    fn from(coordinate: Coordinate) -> Self {
        DependencyRequest::Module(coordinate)
    }
}

impl From<PathBuf> for DependencyRequest {
    fn from(path: PathBuf) -> Self {
        DependencyRequest::Files(vec![path])
    }
}

impl fmt::Display for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyRequest::Module(c) => fmt::Display::fmt(c, f),
            DependencyRequest::Files(files) => {
                write!(f, "files[{}]", files.iter().map(|p| p.display()).join(", "))
            }
        }
    }
}
