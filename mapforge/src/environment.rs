//! Wires the resolver, mapping manager, remapper and synthetic repository
//! together from a [`Config`].

use crate::config::Config;
use crate::dependency::{DependencyResolver, HttpFetcher, MavenFetcher, UrlFetcher};
use crate::error::{Error, Result};
use crate::mapping::{LazyMappingVersion, MappingManager, MappingProvider, McpMappingProvider};
use crate::remap::{ClassRemapEngine, Remapper};
use crate::repo::{
    LauncherArtifactProvider, MappingArtifactProvider, RemappingArtifactProvider,
    SyntheticRepository,
};
use std::sync::Arc;
use tracing::info;

/// Directory under the cache root holding downloaded maven artifacts.
pub const MAVEN_DIR: &str = "maven";

pub struct ForgeEnvironment {
    pub config: Config,
    pub resolver: Arc<DependencyResolver>,
    pub manager: Arc<MappingManager>,
    pub remapper: Arc<Remapper>,
    pub repository: Arc<SyntheticRepository>,
    pub defaults: Arc<LazyMappingVersion>,
}

impl ForgeEnvironment {
    pub fn from_config(config: Config) -> Result<Self> {
        let http = HttpFetcher::new(config.network.timeout())
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self::with_http(config, Arc::new(http)))
    }

    /// Same wiring over a caller-supplied URL fetcher.
    pub fn with_http(config: Config, http: Arc<dyn UrlFetcher>) -> Self {
        let mcp: Arc<dyn MappingProvider> = Arc::new(McpMappingProvider::new());

        let mut fetcher = MavenFetcher::new(
            config.cache_dir.join(MAVEN_DIR),
            config.network.repositories.clone(),
            http.clone(),
        );
        for repository in mcp.repositories() {
            fetcher.add_repository(repository);
        }

        let resolver = Arc::new(DependencyResolver::with_ttl(
            Arc::new(fetcher),
            config.network.dependency_cache_ttl(),
        ));
        let manager = Arc::new(
            MappingManager::new(&config.cache_dir, resolver.clone()).with_refresh(config.refresh),
        );
        manager.register(mcp);

        let remapper = Arc::new(
            Remapper::new(manager.clone(), Arc::new(ClassRemapEngine::new()), &config.cache_dir)
                .with_refresh(config.refresh),
        );
        let defaults = Arc::new(config.mapping_defaults());

        let mut launcher = LauncherArtifactProvider::new(http, config.network.version_manifest.as_str());
        if let Some(os) = &config.network.os {
            launcher = launcher.with_os(os.as_str());
        }

        let repository = SyntheticRepository::new()
            .with_provider(Arc::new(MappingArtifactProvider::new(
                manager.clone(),
                config.minecraft_version.as_str(),
            )))
            .with_provider(Arc::new(RemappingArtifactProvider::new(
                resolver.clone(),
                remapper.clone(),
                defaults.clone(),
                config.minecraft_version.as_str(),
            )))
            .with_provider(Arc::new(launcher));

        info!(
            "Mapforge environment for {} with cache at {}",
            config.minecraft_version,
            config.cache_dir.display()
        );

        Self {
            config,
            resolver,
            manager,
            remapper,
            repository: Arc::new(repository),
            defaults,
        }
    }
}
