mod common;

use common::{csv_coordinate, srg_coordinate, CountingFetcher, Offline};
use mapforge::dependency::{
    ArtifactFetcher, Coordinate, DependencyRequest, DependencyResolver, MavenFetcher, UrlFetcher,
};
use mapforge::{BoxError, Error};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn local_maven(dir: &std::path::Path) -> Arc<MavenFetcher> {
    let repo = dir.join("repo");
    common::write_mcp_repository(&repo, common::JOINED_SRG, common::FIELDS_CSV);
    Arc::new(MavenFetcher::new(
        dir.join("maven"),
        vec![repo.display().to_string()],
        Arc::new(Offline),
    ))
}

#[test]
fn test_parallel_requests_fetch_once() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(CountingFetcher::new(
        local_maven(dir.path()),
        Duration::from_millis(50),
    ));
    let resolver = Arc::new(DependencyResolver::new(fetcher.clone()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = resolver.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                resolver
                    .resolve_one(&DependencyRequest::from(srg_coordinate()))
                    .unwrap()
            })
        })
        .collect();
    let paths: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(fetcher.count(), 1);
    assert!(paths.windows(2).all(|w| w[0] == w[1]));
    assert!(paths[0].ends_with("de/oceanlabs/mcp/mcp/1.12.2/mcp-1.12.2-srg.zip"));
    assert!(paths[0].is_file());
}

#[test]
fn test_distinct_coordinates_do_not_share_results() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(CountingFetcher::new(local_maven(dir.path()), Duration::ZERO));
    let resolver = DependencyResolver::new(fetcher.clone());

    let srg = resolver.resolve_one(&srg_coordinate().into()).unwrap();
    let csv = resolver.resolve_one(&csv_coordinate().into()).unwrap();
    assert_ne!(srg, csv);
    assert_eq!(fetcher.count(), 2);
}

#[test]
fn test_cache_window_expires() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(CountingFetcher::new(local_maven(dir.path()), Duration::ZERO));
    let resolver = DependencyResolver::with_ttl(fetcher.clone(), Duration::from_millis(20));
    let request = DependencyRequest::from(srg_coordinate());

    resolver.resolve(&request).unwrap();
    resolver.resolve(&request).unwrap();
    assert_eq!(fetcher.count(), 1);

    thread::sleep(Duration::from_millis(40));
    resolver.resolve(&request).unwrap();
    assert_eq!(fetcher.count(), 2);
}

#[test]
fn test_missing_artifact_is_empty_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = DependencyResolver::new(local_maven(dir.path()));
    let request = DependencyRequest::from(Coordinate::new("com.example", "absent", "1.0"));

    assert_eq!(resolver.resolve(&request).unwrap(), Vec::<std::path::PathBuf>::new());
    assert!(matches!(
        resolver.resolve_one(&request),
        Err(Error::DependencyResolution { .. })
    ));
}

/// Serves fixed bytes per URL and fails for one host.
struct FakeHttp {
    files: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl UrlFetcher for FakeHttp {
    fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.starts_with("https://broken.example/") {
            return Err("connection refused".into());
        }
        Ok(self.files.get(url).cloned())
    }
}

#[test]
fn test_remote_download_is_stored_locally() {
    let dir = tempfile::tempdir().unwrap();
    let coordinate = Coordinate::new("com.example", "lib", "1.0");
    let url = format!("https://maven.example/{}", coordinate.repository_path());
    let http = Arc::new(FakeHttp {
        files: HashMap::from([(url, b"jar bytes".to_vec())]),
        calls: AtomicUsize::new(0),
    });
    let maven = MavenFetcher::new(
        dir.path().join("maven"),
        vec!["https://empty.example".into(), "https://maven.example/".into()],
        http.clone(),
    );

    let files = maven.fetch(&coordinate).unwrap();
    assert_eq!(files, vec![dir.path().join("maven").join(coordinate.repository_path())]);
    assert_eq!(std::fs::read(&files[0]).unwrap(), b"jar bytes");
    assert_eq!(http.calls.load(Ordering::SeqCst), 2);

    // the local copy answers from now on
    maven.fetch(&coordinate).unwrap();
    assert_eq!(http.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_transport_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let http = Arc::new(FakeHttp {
        files: HashMap::new(),
        calls: AtomicUsize::new(0),
    });
    let maven = Arc::new(MavenFetcher::new(
        dir.path().join("maven"),
        vec!["https://broken.example/".into()],
        http,
    ));
    let resolver = DependencyResolver::new(maven);
    let err = resolver
        .resolve(&Coordinate::new("com.example", "lib", "1.0").into())
        .unwrap_err();
    assert!(matches!(err, Error::DependencyResolution { .. }));
    assert!(std::error::Error::source(&err).is_some());
}
