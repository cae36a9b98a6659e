//! Game client and stripped server jars, and their POM, straight from the
//! launcher's version manifest.

use crate::dependency::UrlFetcher;
use crate::error::{Error, Result};
use crate::remap::archive::filter_entries;
use crate::repo::artifact::{ArtifactMetadata, ArtifactProvider, Provided, SyntheticArtifact};
use crate::repo::identifier::ArtifactIdentifier;
use crate::repo::pom::PomBuilder;
use crate::utils::SingleFlight;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_VERSION_MANIFEST: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest.json";
pub const MANIFEST_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const MAX_CACHED_MANIFESTS: usize = 64;

const GROUP: &str = "net.minecraft";
const NAME: &str = "minecraft";

/// Libraries bundled into the server jar that are provided as regular
/// dependencies instead.
const SERVER_EXCLUDED_PREFIXES: &[&str] = &[
    "org/bouncycastle/",
    "org/apache/",
    "com/google/",
    "com/mojang/authlib/",
    "com/mojang/util/",
    "gnu/trove/",
    "io/netty/",
    "javax/annotation/",
    "argo/",
    "it/unimi/dsi/fastutil/",
];

#[derive(Debug, Clone, Deserialize)]
pub struct VersionList {
    pub versions: Vec<VersionRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionRef {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionManifest {
    pub id: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub downloads: HashMap<String, Download>,
    #[serde(default)]
    pub libraries: Vec<Library>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Download {
    pub url: String,
    pub size: u64,
    pub sha1: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<serde_json::Value>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub action: String,
    #[serde(default)]
    pub os: Option<OsConstraint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsConstraint {
    #[serde(default)]
    pub name: Option<String>,
}

/// Launcher name of the running OS: `windows`, `osx` or `linux`.
pub fn current_os() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "osx",
        _ => "linux",
    }
}

impl Library {
    /// The last rule applying to `os` decides; without one the library is used.
    pub fn is_allowed(&self, os: &str) -> bool {
        let Some(rules) = &self.rules else {
            return true;
        };
        let mut decision = None;
        for rule in rules {
            let applies = match &rule.os {
                None => true,
                Some(constraint) => constraint.name.as_deref() == Some(os),
            };
            if applies {
                decision = Some(rule.action == "allow");
            }
        }
        decision.unwrap_or(true)
    }
}

pub struct LauncherArtifactProvider {
    http: Arc<dyn UrlFetcher>,
    manifest_url: String,
    os: String,
    versions: SingleFlight<String, Arc<VersionList>>,
    manifests: SingleFlight<String, Option<Arc<VersionManifest>>>,
}

impl LauncherArtifactProvider {
    pub fn new(http: Arc<dyn UrlFetcher>, manifest_url: impl Into<String>) -> Self {
        Self {
            http,
            manifest_url: manifest_url.into(),
            os: current_os().to_string(),
            versions: SingleFlight::with_ttl(MANIFEST_CACHE_TTL),
            manifests: SingleFlight::with_ttl(MANIFEST_CACHE_TTL).with_max_entries(MAX_CACHED_MANIFESTS),
        }
    }

    /// Evaluate library rules for `os` instead of the running system.
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let bytes = self
            .http
            .fetch(url)
            .map_err(|e| Error::Manifest(format!("fetching {}: {}", url, e)))?;
        match bytes {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::Manifest(format!("{}: {}", url, e))),
        }
    }

    fn version_list(&self) -> Result<Arc<VersionList>> {
        self.versions.get_or_try_init(&self.manifest_url, || {
            debug!("Fetching version list {}", self.manifest_url);
            self.read_json::<VersionList>(&self.manifest_url)?
                .map(Arc::new)
                .ok_or_else(|| Error::Manifest(format!("{} not found", self.manifest_url)))
        })
    }

    /// Manifest of `version`, or `None` when the launcher does not know it.
    pub fn manifest(&self, version: &str) -> Result<Option<Arc<VersionManifest>>> {
        self.manifests.get_or_try_init(&version.to_string(), || {
            let list = self.version_list()?;
            let Some(entry) = list.versions.iter().find(|v| v.id == version) else {
                return Ok(None);
            };
            let manifest = self
                .read_json::<VersionManifest>(&entry.url)?
                .ok_or_else(|| Error::Manifest(format!("{} not found", entry.url)))?;
            Ok(Some(Arc::new(manifest)))
        })
    }

    fn download<'a>(manifest: &'a VersionManifest, side: &str) -> Result<&'a Download> {
        manifest.downloads.get(side).ok_or_else(|| {
            Error::Manifest(format!("version {} has no {} download", manifest.id, side))
        })
    }

    fn client(&self, manifest: &VersionManifest) -> Result<SyntheticArtifact> {
        let download = Self::download(manifest, "client")?.clone();
        let last_modified = manifest
            .time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));
        let metadata = ArtifactMetadata {
            length: download.size,
            sha1: download.sha1.to_lowercase(),
            last_modified,
        };
        let http = self.http.clone();
        Ok(SyntheticArtifact::lazy(move || fetch_required(http.as_ref(), &download.url))
            .with_metadata(metadata))
    }

    fn server_pure(&self, manifest: &VersionManifest) -> Result<SyntheticArtifact> {
        let url = Self::download(manifest, "server")?.url.clone();
        let http = self.http.clone();
        Ok(SyntheticArtifact::lazy(move || {
            let server = fetch_required(http.as_ref(), &url)?;
            let stripped = filter_entries(&server, Path::new(&url), |name, is_dir| {
                !is_dir && !SERVER_EXCLUDED_PREFIXES.iter().any(|p| name.starts_with(p))
            })?;
            info!(
                "Stripped server jar from {} to {} bytes",
                server.len(),
                stripped.len()
            );
            Ok(stripped)
        }))
    }

    /// POM listing the libraries the game needs on `self.os`.
    pub fn pom(&self, manifest: &VersionManifest) -> Result<String> {
        let mut builder = PomBuilder::new(GROUP, NAME, manifest.id.as_str()).description(NAME);
        for library in manifest.libraries.iter().filter(|l| l.is_allowed(&self.os)) {
            let Some(downloads) = &library.downloads else {
                continue;
            };
            if downloads.artifact.is_some() {
                builder.dependency(&library.name, "compile", None)?;
            }
            if let Some(classifiers) = &downloads.classifiers {
                if classifiers.contains_key("test") {
                    builder.dependency(&library.name, "test", Some("test"))?;
                }
                if let Some(native) = library.natives.as_ref().and_then(|n| n.get(&self.os)) {
                    builder.dependency(&library.name, "runtime", Some(native))?;
                }
            }
        }
        builder.build()
    }
}

fn fetch_required(http: &dyn UrlFetcher, url: &str) -> Result<Vec<u8>> {
    http.fetch(url)
        .map_err(|e| Error::Manifest(format!("downloading {}: {}", url, e)))?
        .ok_or_else(|| Error::Manifest(format!("{} not found", url)))
}

impl ArtifactProvider for LauncherArtifactProvider {
    fn name(&self) -> &str {
        "launcher"
    }

    fn provide(&self, identifier: &ArtifactIdentifier) -> Result<Provided> {
        if identifier.group != GROUP || identifier.name != NAME {
            return Ok(Provided::NotApplicable);
        }
        let wanted = identifier.is_pom()
            || (identifier.extension == "jar"
                && matches!(identifier.classifier.as_deref(), Some("client" | "server-pure")));
        if !wanted {
            return Ok(Provided::NotApplicable);
        }

        let Some(manifest) = self.manifest(&identifier.version)? else {
            debug!("Launcher has no version {}", identifier.version);
            return Ok(Provided::NotApplicable);
        };

        let artifact = if identifier.is_pom() {
            SyntheticArtifact::from_bytes(self.pom(&manifest)?.into_bytes())
        } else if identifier.classifier.as_deref() == Some("client") {
            self.client(&manifest)?
        } else {
            self.server_pure(&manifest)?
        };
        Ok(Provided::Artifact(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LIST: &str = r#"{"versions":[{"id":"1.12.2","url":"https://meta/1.12.2.json"}]}"#;
    const MANIFEST: &str = r#"{
        "id": "1.12.2",
        "time": "2017-09-18T08:39:46+00:00",
        "downloads": {
            "client": {"url": "https://dl/client.jar", "size": 10180113, "sha1": "0F275BC1547D01FA5F56BA34BDC87D981EE12DAF"},
            "server": {"url": "https://dl/server.jar", "size": 1, "sha1": "00"}
        },
        "libraries": [
            {"name": "com.mojang:patchy:1.1", "downloads": {"artifact": {}}},
            {"name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4", "downloads": {"classifiers": {"natives-linux": {}}},
             "natives": {"linux": "natives-linux", "windows": "natives-windows"}},
            {"name": "ca.weblite:java-objc-bridge:1.0.0", "downloads": {"artifact": {}},
             "rules": [{"action": "allow", "os": {"name": "osx"}}]},
            {"name": "org.lwjgl.lwjgl:lwjgl:2.9.2", "downloads": {"artifact": {}},
             "rules": [{"action": "allow"}, {"action": "disallow", "os": {"name": "osx"}}]}
        ]
    }"#;

    struct FakeMeta {
        calls: AtomicUsize,
    }

    impl UrlFetcher for FakeMeta {
        fn fetch(&self, url: &str) -> std::result::Result<Option<Vec<u8>>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match url {
                "https://meta/versions.json" => Some(LIST.as_bytes().to_vec()),
                "https://meta/1.12.2.json" => Some(MANIFEST.as_bytes().to_vec()),
                "https://dl/client.jar" => panic!("client jar must not be downloaded"),
                _ => None,
            })
        }
    }

    fn launcher(os: &str) -> (Arc<FakeMeta>, LauncherArtifactProvider) {
        let meta = Arc::new(FakeMeta {
            calls: AtomicUsize::new(0),
        });
        let provider =
            LauncherArtifactProvider::new(meta.clone(), "https://meta/versions.json").with_os(os);
        (meta, provider)
    }

    #[test]
    fn test_rules_last_match_wins() {
        let manifest: VersionManifest = serde_json::from_str(MANIFEST).unwrap();
        let allowed = |os: &str| {
            manifest
                .libraries
                .iter()
                .filter(|l| l.is_allowed(os))
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
        };
        assert!(allowed("linux").contains(&"org.lwjgl.lwjgl:lwjgl:2.9.2"));
        assert!(!allowed("linux").contains(&"ca.weblite:java-objc-bridge:1.0.0"));
        assert!(!allowed("osx").contains(&"org.lwjgl.lwjgl:lwjgl:2.9.2"));
        assert!(allowed("osx").contains(&"ca.weblite:java-objc-bridge:1.0.0"));
    }

    #[test]
    fn test_client_metadata_without_download() {
        let (meta, launcher) = launcher("linux");
        let id = ArtifactIdentifier::new(GROUP, NAME, "1.12.2").with_classifier("client");
        let artifact = launcher.provide(&id).unwrap().into_artifact().unwrap();
        let metadata = artifact.metadata().unwrap();
        assert_eq!(metadata.length, 10180113);
        assert_eq!(metadata.sha1, "0f275bc1547d01fa5f56ba34bdc87d981ee12daf");
        assert_eq!(
            metadata.last_modified.unwrap().to_rfc3339(),
            "2017-09-18T08:39:46+00:00"
        );

        // The manifests are cached.
        launcher.provide(&id).unwrap();
        assert_eq!(meta.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pom_dependencies() {
        let (_, launcher) = launcher("linux");
        let id = ArtifactIdentifier::new(GROUP, NAME, "1.12.2").with_extension("pom");
        let artifact = launcher.provide(&id).unwrap().into_artifact().unwrap();
        let pom = String::from_utf8(artifact.bytes().unwrap().to_vec()).unwrap();
        assert!(pom.contains("<artifactId>patchy</artifactId>"));
        assert!(pom.contains("<classifier>natives-linux</classifier>"));
        assert!(!pom.contains("java-objc-bridge"));
        assert!(pom.contains("<artifactId>lwjgl</artifactId>"));
    }

    #[test]
    fn test_unknown_versions_and_coordinates() {
        let (_, launcher) = launcher("linux");
        let unknown = ArtifactIdentifier::new(GROUP, NAME, "0.0.1").with_classifier("client");
        assert!(!launcher.provide(&unknown).unwrap().is_applicable());

        let other = ArtifactIdentifier::new("net.minecraft", "launchwrapper", "1.12");
        assert!(!launcher.provide(&other).unwrap().is_applicable());

        let plain = ArtifactIdentifier::new(GROUP, NAME, "1.12.2");
        assert!(!launcher.provide(&plain).unwrap().is_applicable());
    }
}
