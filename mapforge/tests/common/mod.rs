#![allow(dead_code)]

use mapforge::dependency::{ArtifactFetcher, Coordinate, DependencyResolver, MavenFetcher, UrlFetcher};
use mapforge::mapping::{MappingManager, MappingVersion, McpMappingProvider};
use mapforge::remap::classfile::{ClassFile, ACC_PUBLIC};
use mapforge::BoxError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const MC_VERSION: &str = "1.12.2";
pub const CHANNEL: &str = "snapshot";
pub const MAPPING_VERSION: &str = "20171003";

pub const JOINED_SRG: &str = "\
PK: . net/minecraft/src
CL: a net/minecraft/src/Block
CL: b net/minecraft/src/World
FD: a/a net/minecraft/src/Block/field_1_a
FD: a/b net/minecraft/src/Block/field_2_b
FD: b/a net/minecraft/src/World/field_3_c
MD: a/a (Lb;)V net/minecraft/src/Block/func_1_a (Lnet/minecraft/src/World;)V
MD: b/a ()I net/minecraft/src/World/func_2_b ()I
";

/// `field_3_c` has no row and keeps its SRG name.
pub const FIELDS_CSV: &str = "\
searge,name,side,desc
field_1_a,hardness,2,
field_2_b,resistance,2,
";

pub const METHODS_CSV: &str = "\
searge,name,side,desc
func_1_a,onPlaced,2,
func_2_b,getHeight,2,
";

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

pub fn srg_coordinate() -> Coordinate {
    Coordinate::new("de.oceanlabs.mcp", "mcp", MC_VERSION)
        .with_classifier("srg")
        .with_extension("zip")
}

pub fn csv_coordinate() -> Coordinate {
    Coordinate::new(
        "de.oceanlabs.mcp",
        format!("mcp_{}", CHANNEL),
        format!("{}-{}", MAPPING_VERSION, MC_VERSION),
    )
    .with_extension("zip")
}

/// Local maven repository holding the MCP archives.
pub fn write_mcp_repository(repo: &Path, joined: &str, fields: &str) {
    write_zip(
        &repo.join(srg_coordinate().repository_path()),
        &[("joined.srg", joined.as_bytes())],
    );
    write_zip(
        &repo.join(csv_coordinate().repository_path()),
        &[
            ("fields.csv", fields.as_bytes()),
            ("methods.csv", METHODS_CSV.as_bytes()),
        ],
    );
}

/// Never reaches the network.
pub struct Offline;

impl UrlFetcher for Offline {
    fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>, BoxError> {
        Err(format!("offline: {}", url).into())
    }
}

/// Counts calls and optionally stalls each one.
pub struct CountingFetcher {
    inner: Arc<dyn ArtifactFetcher>,
    pub calls: AtomicUsize,
    delay: Duration,
}

impl CountingFetcher {
    pub fn new(inner: Arc<dyn ArtifactFetcher>, delay: Duration) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactFetcher for CountingFetcher {
    fn fetch(&self, coordinate: &Coordinate) -> Result<Vec<PathBuf>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.fetch(coordinate)
    }
}

pub fn version(direction: &str) -> MappingVersion {
    MappingVersion::new("mcp", CHANNEL, MAPPING_VERSION, MC_VERSION, direction)
}

pub struct Fixture {
    pub dir: TempDir,
    pub cache: PathBuf,
    pub repo: PathBuf,
    pub fetcher: Arc<CountingFetcher>,
    pub resolver: Arc<DependencyResolver>,
    pub provider: Arc<McpMappingProvider>,
    pub manager: Arc<MappingManager>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_sources(JOINED_SRG, FIELDS_CSV, Duration::ZERO)
    }

    pub fn with_sources(joined: &str, fields: &str, delay: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let repo = dir.path().join("repo");
        write_mcp_repository(&repo, joined, fields);

        let maven = MavenFetcher::new(
            cache.join("maven"),
            vec![repo.display().to_string()],
            Arc::new(Offline),
        );
        let fetcher = Arc::new(CountingFetcher::new(Arc::new(maven), delay));
        let resolver = Arc::new(DependencyResolver::new(fetcher.clone()));
        let provider = Arc::new(McpMappingProvider::new());
        let manager = Arc::new(MappingManager::new(&cache, resolver.clone()));
        manager.register(provider.clone());

        Self {
            dir,
            cache,
            repo,
            fetcher,
            resolver,
            provider,
            manager,
        }
    }
}

/// Game classes in obfuscated names: `a` (Block), `b` (World) and `c`, an
/// unmapped subclass of `a` that uses inherited members.
pub fn obfuscated_classes() -> Vec<ClassFile> {
    let mut a = ClassFile::new("a", Some("java/lang/Object"));
    a.add_field(ACC_PUBLIC, "a", "I").unwrap();
    a.add_field(ACC_PUBLIC, "b", "F").unwrap();
    a.add_method(ACC_PUBLIC, "a", "(Lb;)V").unwrap();

    let mut b = ClassFile::new("b", Some("java/lang/Object"));
    b.add_field(ACC_PUBLIC, "a", "J").unwrap();
    b.add_method(ACC_PUBLIC, "a", "()I").unwrap();

    let mut c = ClassFile::new("c", Some("a"));
    c.method_ref("c", "a", "(Lb;)V").unwrap();
    c.field_ref("c", "b", "F").unwrap();
    c.add_method(ACC_PUBLIC, "<init>", "()V").unwrap();

    vec![a, b, c]
}

pub fn write_game_jar(path: &Path) {
    let classes: Vec<(String, Vec<u8>)> = obfuscated_classes()
        .iter()
        .map(|c| (format!("{}.class", c.this_name().unwrap()), c.to_bytes()))
        .collect();
    let mut entries: Vec<(&str, &[u8])> = classes
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
        .collect();
    entries.push(("assets/lang/en_us.lang", &b"tile.stone.name=Stone"[..]));
    entries.push(("META-INF/MOJANGCS.SF", &b"Signature-Version: 1.0"[..]));
    write_zip(path, &entries);
}

pub fn utf8_constants(class: &ClassFile) -> Vec<String> {
    class
        .pool
        .iter()
        .filter_map(|c| match c {
            mapforge::remap::classfile::Constant::Utf8(bytes) => {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
            _ => None,
        })
        .collect()
}
