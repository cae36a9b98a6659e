//! Raw byte fetching: URLs over HTTP and artifacts from maven repositories.

use crate::dependency::coordinate::Coordinate;
use crate::dependency::resolver::ArtifactFetcher;
use crate::error::BoxError;
use crate::utils::fs::atomic_write;
use reqwest::blocking::Client as BlockingHttpClient;
use reqwest::StatusCode;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches the bytes behind a URL. `Ok(None)` means the resource does not
/// exist; transport failures and other error statuses are `Err`.
pub trait UrlFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>, BoxError>;
}

pub struct HttpFetcher {
    client: BlockingHttpClient,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, BoxError> {
        let client = BlockingHttpClient::builder()
            .timeout(timeout)
            .user_agent(concat!("mapforge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl UrlFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>, BoxError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes()?.to_vec())),
            status => Err(format!("GET {} returned {}", url, status).into()),
        }
    }
}

/// Looks up artifacts in `<local>/<maven path>` first, then in each remote
/// repository in order, storing downloads in the local layout.
pub struct MavenFetcher {
    local: PathBuf,
    repositories: Vec<String>,
    http: Arc<dyn UrlFetcher>,
}

impl MavenFetcher {
    pub fn new(local: impl Into<PathBuf>, repositories: Vec<String>, http: Arc<dyn UrlFetcher>) -> Self {
        Self {
            local: local.into(),
            repositories,
            http,
        }
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    /// Adds a repository unless it is already configured.
    pub fn add_repository(&mut self, repository: impl Into<String>) {
        let repository = repository.into();
        if !self.repositories.contains(&repository) {
            self.repositories.push(repository);
        }
    }

    fn fetch_from(&self, repository: &str, relative: &str) -> Result<Option<Vec<u8>>, BoxError> {
        match local_repository_dir(repository) {
            Some(dir) => {
                let path = dir.join(relative);
                if path.is_file() {
                    Ok(Some(fs::read(&path)?))
                } else {
                    Ok(None)
                }
            }
            None => {
                let url = format!("{}/{}", repository.trim_end_matches('/'), relative);
                self.http.fetch(&url)
            }
        }
    }
}

impl ArtifactFetcher for MavenFetcher {
    fn fetch(&self, coordinate: &Coordinate) -> Result<Vec<PathBuf>, BoxError> {
        let relative = coordinate.repository_path();
        let cached = self.local.join(&relative);
        if cached.is_file() {
            debug!("Using cached {}", cached.display());
            return Ok(vec![cached]);
        }

        for repository in &self.repositories {
            if let Some(bytes) = self.fetch_from(repository, &relative)? {
                info!("Downloaded {} from {}", coordinate, repository);
                atomic_write(&cached, &bytes)?;
                return Ok(vec![cached]);
            }
        }
        debug!("{} not found in {} repositories", coordinate, self.repositories.len());
        Ok(Vec::new())
    }
}

/// A repository given as `file://` URL or plain path is read from disk.
fn local_repository_dir(repository: &str) -> Option<&Path> {
    if let Some(path) = repository.strip_prefix("file://") {
        return Some(Path::new(path));
    }
    if repository.contains("://") {
        None
    } else {
        Some(Path::new(repository))
    }
}
