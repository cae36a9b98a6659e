use crate::error::{Error, Result};
use crate::mapping::{LazyMappingVersion, MappingVersion};
use crate::repo::launcher::DEFAULT_VERSION_MANIFEST;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";
pub const MINECRAFT_LIBRARIES: &str = "https://libraries.minecraft.net/";

/// Top-level configuration, usually read from `mapforge.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the on-disk caches
    pub cache_dir: PathBuf,
    /// Target game version the mappings apply to
    pub minecraft_version: String,
    /// Regenerate cached mapping files and remapped archives once per run
    pub refresh: bool,
    /// Default mapping set
    pub mappings: MappingsConfig,
    /// Repositories and network behaviour
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            minecraft_version: "1.12.2".to_string(),
            refresh: false,
            mappings: MappingsConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

/// `[mappings]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingsConfig {
    /// Registered provider name (e.g. `mcp`)
    pub provider: String,
    /// Mapping channel (`snapshot`, `stable`, ...)
    pub channel: String,
    /// Mapping version within the channel
    pub version: String,
    /// Direction used when a remap coordinate gives no mapping set
    pub deobf_direction: String,
}

impl Default for MappingsConfig {
    fn default() -> Self {
        Self {
            provider: "mcp".to_string(),
            channel: "snapshot".to_string(),
            version: "20171003".to_string(),
            deobf_direction: "notch-mcp".to_string(),
        }
    }
}

/// `[network]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Extra maven repositories (URLs or local directories), tried in order
    pub repositories: Vec<String>,
    /// Launcher version list URL
    pub version_manifest: String,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
    /// How long resolved dependencies are reused
    pub dependency_cache_ttl_secs: u64,
    /// OS name for launcher library rules (`windows`, `osx`, `linux`)
    pub os: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            repositories: vec![
                MAVEN_CENTRAL.to_string(),
                MINECRAFT_LIBRARIES.to_string(),
            ],
            version_manifest: DEFAULT_VERSION_MANIFEST.to_string(),
            timeout_secs: 30,
            dependency_cache_ttl_secs: 30 * 60,
            os: None,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn dependency_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dependency_cache_ttl_secs)
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".mapforge"))
        .unwrap_or_else(|| PathBuf::from(".mapforge"))
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Default mapping version in the configured direction.
    pub fn mapping_version(&self) -> MappingVersion {
        MappingVersion::new(
            self.mappings.provider.as_str(),
            self.mappings.channel.as_str(),
            self.mappings.version.as_str(),
            self.minecraft_version.as_str(),
            self.mappings.deobf_direction.as_str(),
        )
    }

    /// The mapping defaults, resolved on first use.
    pub fn mapping_defaults(&self) -> LazyMappingVersion {
        let config = self.clone();
        LazyMappingVersion::new(move || config.mapping_version())
    }
}
