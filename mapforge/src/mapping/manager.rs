//! Registry of mapping providers and the on-disk cache of generated tables.

use crate::dependency::DependencyResolver;
use crate::error::{Error, Result};
use crate::mapping::provider::{MappingProvider, ResolvedDependencies};
use crate::mapping::srg;
use crate::mapping::version::{MappingVersion, MAPPING_EXTENSION};
use crate::utils::fs::{atomic_write, sanitize_filename};
use crate::utils::hash::sha256_file;
use dashmap::{DashMap, DashSet};
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

pub const GENERATED_MAPPINGS_DIR: &str = "generated_mappings";

pub struct MappingManager {
    providers: DashMap<String, Arc<dyn MappingProvider>>,
    resolver: Arc<DependencyResolver>,
    cache_dir: PathBuf,
    refresh: bool,
    /// Files regenerated during this manager's lifetime when `refresh` is set.
    refreshed: DashSet<PathBuf>,
    file_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl MappingManager {
    pub fn new(cache_dir: impl Into<PathBuf>, resolver: Arc<DependencyResolver>) -> Self {
        Self {
            providers: DashMap::new(),
            resolver,
            cache_dir: cache_dir.into(),
            refresh: false,
            refreshed: DashSet::new(),
            file_locks: DashMap::new(),
        }
    }

    /// Regenerate each cached table once before reusing it.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Adds a provider, replacing any provider registered under the same name.
    pub fn register(&self, provider: Arc<dyn MappingProvider>) {
        let name = provider.name().to_string();
        if self.providers.insert(name.clone(), provider).is_some() {
            debug!("Replaced mapping provider {}", name);
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn MappingProvider>> {
        self.providers
            .get(name)
            .map(|p| p.value().clone())
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))
    }

    /// Union of every provider's dependency repositories.
    pub fn repositories(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(|p| p.value().repositories())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `<cache>/generated_mappings/<provider>/<mc>-<channel>_<version>/<direction>.srg`
    pub fn mapping_path(&self, version: &MappingVersion) -> PathBuf {
        self.cache_dir
            .join(GENERATED_MAPPINGS_DIR)
            .join(sanitize_filename(&version.provider))
            .join(sanitize_filename(&format!(
                "{}-{}_{}",
                version.target_version, version.channel, version.version
            )))
            .join(format!(
                "{}.{}",
                sanitize_filename(&version.direction),
                MAPPING_EXTENSION
            ))
    }

    /// Path of the generated table for `version`, generating it if needed.
    pub fn mapping_file(&self, version: &MappingVersion) -> Result<PathBuf> {
        let provider = self.provider(&version.provider)?;
        if !provider.supports(&version.direction) {
            return Err(Error::UnsupportedDirection {
                provider: version.provider.clone(),
                direction: version.direction.clone(),
            });
        }

        let path = self.mapping_path(version);
        let lock = self.file_locks.entry(path.clone()).or_default().clone();
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let must_refresh = self.refresh && !self.refreshed.contains(&path);
        if path.is_file() && !must_refresh {
            debug!("Using cached mapping {}", path.display());
            return Ok(path);
        }

        let count = self
            .generate(provider.as_ref(), version, &path)
            .map_err(|source| Error::mapping(version, source))?;
        if self.refresh {
            self.refreshed.insert(path.clone());
        }

        info!(
            "Generated {} mapping entries for {} at {}",
            count,
            version,
            path.display()
        );
        Ok(path)
    }

    fn generate(&self, provider: &dyn MappingProvider, version: &MappingVersion, path: &Path) -> Result<usize> {
        let mut dependencies = ResolvedDependencies::new();
        for (handle, request) in provider.dependencies(version) {
            dependencies.insert(handle, self.resolver.resolve_one(&request)?);
        }
        let table = provider.mapping(version, &dependencies)?;
        atomic_write(path, srg::write(&table)?.as_bytes())?;
        Ok(table.len())
    }

    /// Contents of the generated table for `version`.
    pub fn mapping_bytes(&self, version: &MappingVersion) -> Result<Vec<u8>> {
        let path = self.mapping_file(version)?;
        fs::read(&path).map_err(|e| Error::io(path, e))
    }

    /// SHA-256 of the generated table, lowercase hex.
    pub fn mapping_hash(&self, version: &MappingVersion) -> Result<String> {
        let path = self.mapping_file(version)?;
        sha256_file(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{ArtifactFetcher, Coordinate, DependencyRequest};
    use crate::error::BoxError;
    use crate::mapping::entry::MappingEntry;
    use crate::mapping::table::MappingTable;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoFetch;

    impl ArtifactFetcher for NoFetch {
        fn fetch(&self, _: &Coordinate) -> std::result::Result<Vec<PathBuf>, BoxError> {
            Ok(Vec::new())
        }
    }

    struct Identity {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl MappingProvider for Identity {
        fn name(&self) -> &str {
            self.name
        }

        fn supported_directions(&self) -> &[&str] {
            &["a-b"]
        }

        fn repositories(&self) -> Vec<String> {
            vec!["https://repo.example/".to_string()]
        }

        fn dependencies(&self, _: &MappingVersion) -> Vec<(&'static str, DependencyRequest)> {
            Vec::new()
        }

        fn mapping(&self, _: &MappingVersion, _: &ResolvedDependencies) -> Result<MappingTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut table = MappingTable::new();
            table.insert(MappingEntry::class("x"), MappingEntry::class("y"))?;
            Ok(table)
        }
    }

    fn manager(dir: &Path) -> MappingManager {
        MappingManager::new(dir, Arc::new(DependencyResolver::new(Arc::new(NoFetch))))
    }

    fn version(direction: &str) -> MappingVersion {
        MappingVersion::new("id", "stable", "39", "1.12", direction)
    }

    #[test]
    fn test_unknown_provider_and_direction() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        assert!(matches!(
            manager.mapping_file(&version("a-b")),
            Err(Error::ProviderNotFound(name)) if name == "id"
        ));

        manager.register(Arc::new(Identity {
            name: "id",
            calls: AtomicUsize::new(0),
        }));
        assert!(manager.is_registered("id"));
        assert!(matches!(
            manager.mapping_file(&version("b-a")),
            Err(Error::UnsupportedDirection { .. })
        ));
    }

    #[test]
    fn test_cache_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = manager(dir.path()).mapping_path(&version("a-b"));
        assert_eq!(
            path,
            dir.path()
                .join("generated_mappings/id/1.12-stable_39/a-b.srg")
        );
    }

    #[test]
    fn test_refresh_regenerates_once_per_manager() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(Identity {
            name: "id",
            calls: AtomicUsize::new(0),
        });

        let plain = manager(dir.path());
        plain.register(provider.clone());
        plain.mapping_file(&version("a-b")).unwrap();
        plain.mapping_file(&version("a-b")).unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let refreshing = manager(dir.path()).with_refresh(true);
        refreshing.register(provider.clone());
        let bytes = refreshing.mapping_bytes(&version("a-b")).unwrap();
        refreshing.mapping_hash(&version("a-b")).unwrap();
        assert_eq!(bytes, b"CL: x y\n");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshing.repositories(), vec!["https://repo.example/".to_string()]);
    }
}
