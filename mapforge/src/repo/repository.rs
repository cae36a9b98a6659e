//! A chain of artifact providers addressed by maven repository paths.

use crate::error::Result;
use crate::repo::artifact::{ArtifactMetadata, ArtifactProvider, Provided, SyntheticArtifact};
use crate::repo::identifier::ArtifactIdentifier;
use crate::utils::SingleFlight;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const SHA1_SUFFIX: &str = ".sha1";

/// How long an artifact looked up for metadata waits for its content fetch.
pub const KEEP_TTL: Duration = Duration::from_secs(60);

/// Upper bound on artifacts waiting for their content fetch.
pub const KEEP_MAX_ENTRIES: usize = 32;

/// Asks each provider in turn; the first applicable answer wins.
///
/// Artifacts looked up for metadata are kept briefly so that bytes produced
/// to compute a checksum are not produced again by the content fetch that
/// usually follows. A kept artifact is released by that fetch or after
/// [`KEEP_TTL`], and at most [`KEEP_MAX_ENTRIES`] are kept at once.
pub struct SyntheticRepository {
    providers: Vec<Arc<dyn ArtifactProvider>>,
    kept: SingleFlight<String, Arc<SyntheticArtifact>>,
}

impl Default for SyntheticRepository {
    fn default() -> Self {
        Self::with_retention(KEEP_TTL, KEEP_MAX_ENTRIES)
    }
}

impl SyntheticRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(ttl: Duration, max_entries: usize) -> Self {
        Self {
            providers: Vec::new(),
            kept: SingleFlight::with_ttl(ttl).with_max_entries(max_entries),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ArtifactProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    /// Asks the providers afresh; kept artifacts are not consulted.
    pub fn resolve(&self, identifier: &ArtifactIdentifier) -> Result<Option<Arc<SyntheticArtifact>>> {
        for provider in &self.providers {
            match provider.provide(identifier)? {
                Provided::Artifact(artifact) => {
                    debug!("{} provides {}", provider.name(), identifier);
                    return Ok(Some(Arc::new(artifact)));
                }
                Provided::NotApplicable => trace!("{} passes on {}", provider.name(), identifier),
            }
        }
        Ok(None)
    }

    fn resolve_kept(&self, identifier: &ArtifactIdentifier) -> Result<Option<Arc<SyntheticArtifact>>> {
        // `Err(None)` marks an identifier nobody provides; it is not kept
        let kept = self
            .kept
            .get_or_try_init(&identifier.to_string(), || match self.resolve(identifier) {
                Ok(Some(artifact)) => Ok(artifact),
                Ok(None) => Err(None),
                Err(e) => Err(Some(e)),
            });
        match kept {
            Ok(artifact) => Ok(Some(artifact)),
            Err(None) => Ok(None),
            Err(Some(e)) => Err(e),
        }
    }

    /// Metadata for a repository path; `None` when no provider owns it.
    pub fn metadata(&self, path: &str) -> Result<Option<ArtifactMetadata>> {
        let Some(identifier) = ArtifactIdentifier::from_path(path) else {
            return Ok(None);
        };
        if let Some(base) = checksum_base(&identifier) {
            return Ok(self.checksum(&base)?.map(|sha1| ArtifactMetadata::of(sha1.as_bytes())));
        }
        match self.resolve_kept(&identifier)? {
            Some(artifact) => artifact.metadata().map(Some),
            None => Ok(None),
        }
    }

    /// Content for a repository path; `None` when no provider owns it.
    pub fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(identifier) = ArtifactIdentifier::from_path(path) else {
            trace!("{} is not an artifact path", path);
            return Ok(None);
        };
        if let Some(base) = checksum_base(&identifier) {
            return Ok(self.checksum(&base)?.map(String::into_bytes));
        }

        let artifact = match self.kept.take(&identifier.to_string()) {
            Some(artifact) => Some(artifact),
            None => self.resolve(&identifier)?,
        };
        match artifact {
            Some(artifact) => Ok(Some(artifact.bytes()?.as_ref().clone())),
            None => Ok(None),
        }
    }

    fn checksum(&self, base: &ArtifactIdentifier) -> Result<Option<String>> {
        match self.resolve_kept(base)? {
            Some(artifact) => Ok(Some(artifact.metadata()?.sha1)),
            None => Ok(None),
        }
    }
}

fn checksum_base(identifier: &ArtifactIdentifier) -> Option<ArtifactIdentifier> {
    let extension = identifier.extension.strip_suffix(SHA1_SUFFIX)?;
    Some(identifier.clone().with_extension(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        produced: Arc<AtomicUsize>,
    }

    impl ArtifactProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn provide(&self, identifier: &ArtifactIdentifier) -> Result<Provided> {
            if identifier.group != "synthetic" {
                return Ok(Provided::NotApplicable);
            }
            let produced = self.produced.clone();
            Ok(Provided::Artifact(SyntheticArtifact::lazy(move || {
                produced.fetch_add(1, Ordering::SeqCst);
                Ok(b"abc".to_vec())
            })))
        }
    }

    fn repository() -> (Arc<AtomicUsize>, SyntheticRepository) {
        let produced = Arc::new(AtomicUsize::new(0));
        let repo = SyntheticRepository::new().with_provider(Arc::new(Counting {
            produced: produced.clone(),
        }));
        (produced, repo)
    }

    #[test]
    fn test_metadata_then_fetch_produces_once() {
        let (produced, repo) = repository();
        let metadata = repo.metadata("/synthetic/a/1/a-1.jar").unwrap().unwrap();
        assert_eq!(metadata.length, 3);
        let bytes = repo.fetch("/synthetic/a/1/a-1.jar").unwrap().unwrap();
        assert_eq!(bytes, b"abc");
        assert_eq!(produced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_checksum_paths() {
        let (produced, repo) = repository();
        let sha1 = repo.fetch("/synthetic/a/1/a-1.jar.sha1").unwrap().unwrap();
        assert_eq!(sha1, b"a9993e364706816aba3e25717850c26c9cd0d89d");
        repo.fetch("/synthetic/a/1/a-1.jar").unwrap().unwrap();
        assert_eq!(produced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_checksum_after_content_is_kept_briefly() {
        let produced = Arc::new(AtomicUsize::new(0));
        let repo = SyntheticRepository::with_retention(Duration::from_millis(10), 4).with_provider(
            Arc::new(Counting {
                produced: produced.clone(),
            }),
        );
        let jar = "/synthetic/a/1/a-1.jar";
        let sha1 = "/synthetic/a/1/a-1.jar.sha1";

        repo.fetch(jar).unwrap().unwrap();
        assert!(repo.kept.is_empty());
        repo.fetch(sha1).unwrap().unwrap();
        repo.fetch(sha1).unwrap().unwrap();
        assert_eq!(repo.kept.len(), 1);
        assert_eq!(produced.load(Ordering::SeqCst), 2);

        std::thread::sleep(Duration::from_millis(30));
        repo.metadata("/synthetic/b/1/b-1.jar").unwrap().unwrap();
        assert_eq!(repo.kept.len(), 1);
        repo.fetch(sha1).unwrap().unwrap();
        assert_eq!(produced.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_kept_artifacts_are_bounded() {
        let (_, repo) = repository();
        for i in 0..100 {
            repo.metadata(&format!("/synthetic/a{i}/1/a{i}-1.jar"))
                .unwrap()
                .unwrap();
        }
        assert_eq!(repo.kept.len(), KEEP_MAX_ENTRIES);
    }

    #[test]
    fn test_expired_artifacts_are_produced_again() {
        let produced = Arc::new(AtomicUsize::new(0));
        let repo = SyntheticRepository::with_retention(Duration::from_millis(10), 4).with_provider(
            Arc::new(Counting {
                produced: produced.clone(),
            }),
        );
        let id = ArtifactIdentifier::new("synthetic", "a", "1");

        repo.metadata(&id.to_path()).unwrap().unwrap();
        // direct resolution always asks the providers
        assert!(!repo.resolve(&id).unwrap().unwrap().is_materialized());

        std::thread::sleep(Duration::from_millis(30));
        repo.fetch(&id.to_path()).unwrap().unwrap();
        assert_eq!(produced.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unowned_paths() {
        let (_, repo) = repository();
        assert_eq!(repo.fetch("/com/example/a/1/a-1.jar").unwrap(), None);
        assert_eq!(repo.metadata("/com/example/a/1/a-1.jar.sha1").unwrap(), None);
        assert_eq!(repo.fetch("not-a-path").unwrap(), None);
        assert!(repo.kept.is_empty());
    }
}
