//! Memoized, single-flight dependency resolution.

use crate::dependency::coordinate::{Coordinate, DependencyRequest};
use crate::error::{BoxError, Error, Result};
use crate::utils::SingleFlight;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long a resolved coordinate is reused before being fetched again.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on remembered coordinates.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Turns a coordinate into local files. An empty result means the artifact
/// does not exist anywhere the fetcher looks; an `Err` means looking failed.
pub trait ArtifactFetcher: Send + Sync {
    fn fetch(&self, coordinate: &Coordinate) -> std::result::Result<Vec<PathBuf>, BoxError>;
}

pub struct DependencyResolver {
    fetcher: Arc<dyn ArtifactFetcher>,
    resolved: SingleFlight<String, Arc<Vec<PathBuf>>>,
}

impl DependencyResolver {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self::with_ttl(fetcher, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(fetcher: Arc<dyn ArtifactFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            resolved: SingleFlight::with_ttl(ttl).with_max_entries(DEFAULT_MAX_ENTRIES),
        }
    }

    /// Local files for `request`. Module requests are fetched at most once
    /// per cache window; concurrent callers for the same key wait for the
    /// first one.
    pub fn resolve(&self, request: &DependencyRequest) -> Result<Vec<PathBuf>> {
        match request {
            DependencyRequest::Files(files) => Ok(files.clone()),
            DependencyRequest::Module(coordinate) => {
                self.resolve_coordinate(coordinate).map(|files| files.to_vec())
            }
        }
    }

    /// First file of `request`, failing when nothing was found.
    pub fn resolve_one(&self, request: &DependencyRequest) -> Result<PathBuf> {
        self.resolve(request)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::DependencyResolution {
                coordinate: request.to_string(),
                source: "artifact not found in any repository".into(),
            })
    }

    fn resolve_coordinate(&self, coordinate: &Coordinate) -> Result<Arc<Vec<PathBuf>>> {
        let key = coordinate.key();
        self.resolved.get_or_try_init(&key, || {
            debug!("Resolving dependency {}", key);
            let files = self
                .fetcher
                .fetch(coordinate)
                .map_err(|source| Error::DependencyResolution {
                    coordinate: key.clone(),
                    source,
                })?;
            debug!("Resolved {} to {} file(s)", key, files.len());
            Ok(Arc::new(files))
        })
    }

    /// Drops every memoized result.
    pub fn clear(&self) {
        self.resolved.clear();
    }
}
