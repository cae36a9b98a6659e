//! Error type shared by every mapforge component.
//!
//! One enum covers the whole taxonomy: provider lookup, direction validation,
//! mapping source parsing, dependency resolution, remapping and cache
//! publication. "Not applicable" answers from the synthesis layer are not
//! errors and never appear here; see [`crate::repo::Provided`].

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause attached to collaborator failures (fetchers, rewrite engines).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not find requested mapping provider \"{0}\"")]
    ProviderNotFound(String),

    #[error("mapping provider \"{provider}\" does not support direction \"{direction}\"")]
    UnsupportedDirection { provider: String, direction: String },

    #[error("{}", parse_message(source_name, *line, message))]
    MappingSourceParse {
        source_name: String,
        line: Option<usize>,
        message: String,
    },

    #[error("failed to generate mapping {version}")]
    Mapping {
        version: String,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to resolve dependency {coordinate}")]
    DependencyResolution {
        coordinate: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to remap {}", input.display())]
    Remap {
        input: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("failed to write cache file {}", path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid archive {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("invalid version manifest: {0}")]
    Manifest(String),

    #[error("POM error: {0}")]
    Pom(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn parse_message(source_name: &str, line: Option<usize>, message: &str) -> String {
    match line {
        Some(line) => format!("failed to parse {source_name} (line {line}): {message}"),
        None => format!("failed to parse {source_name}: {message}"),
    }
}

impl Error {
    pub fn parse(source_name: impl Into<String>, line: Option<usize>, message: impl Into<String>) -> Self {
        Error::MappingSourceParse {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn remap(input: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Error::Remap {
            input: input.into(),
            source: source.into(),
        }
    }

    /// Wraps a failure to produce the table for `version`.
    pub fn mapping(version: impl fmt::Display, source: Error) -> Self {
        Error::Mapping {
            version: version.to_string(),
            source: Box::new(source),
        }
    }

    /// True for errors raised because the mapping source itself is malformed
    /// or inconsistent.
    pub fn is_parse_error(&self) -> bool {
        match self {
            Error::MappingSourceParse { .. } => true,
            Error::Mapping { source, .. } => source.is_parse_error(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_parse_error_mentions_line() {
        let err = Error::parse("joined.srg", Some(3), "expected 2 names");
        assert_eq!(
            err.to_string(),
            "failed to parse joined.srg (line 3): expected 2 names"
        );
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_mapping_error_names_the_version() {
        let err = Error::mapping("mcp:snapshot_1@1.12[notch-srg]", Error::parse("joined.srg", Some(1), "bad"));
        assert_eq!(err.to_string(), "failed to generate mapping mcp:snapshot_1@1.12[notch-srg]");
        assert!(err.is_parse_error());
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("failed to parse joined.srg (line 1): bad".to_string())
        );
    }

    #[test]
    fn test_remap_error_keeps_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = Error::remap("/tmp/in.jar", cause);
        assert_eq!(err.to_string(), "failed to remap /tmp/in.jar");
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk full".to_string()));
    }
}
