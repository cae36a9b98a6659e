//! Archive remapping pipeline with a content-addressed output cache.

use crate::error::{Error, Result};
use crate::mapping::{MappingManager, MappingVersion};
use crate::remap::archive::normalize_timestamps;
use crate::remap::engine::RewriteEngine;
use crate::remap::inheritance::{ArchiveInheritance, JointInheritance};
use crate::remap::jar_mapping::JarMapping;
use crate::utils::fs::{publish, sanitize_filename, temp_file_beside};
use crate::utils::hash::sha256_file;
use dashmap::{DashMap, DashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

pub const REMAPPED_DIR: &str = "remapped";

pub struct Remapper {
    manager: Arc<MappingManager>,
    engine: Arc<dyn RewriteEngine>,
    output_dir: PathBuf,
    refresh: bool,
    /// Outputs already rewritten during this refresh pass.
    refreshed: DashSet<PathBuf>,
    output_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl Remapper {
    /// Outputs go to `<cache_dir>/remapped/`.
    pub fn new(
        manager: Arc<MappingManager>,
        engine: Arc<dyn RewriteEngine>,
        cache_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            manager,
            engine,
            output_dir: cache_dir.as_ref().join(REMAPPED_DIR),
            refresh: false,
            refreshed: DashSet::new(),
            output_locks: DashMap::new(),
        }
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn manager(&self) -> &Arc<MappingManager> {
        &self.manager
    }

    /// Rewrites `input` into `output` using every table in `mappings`.
    ///
    /// The archive's own classes and the `classpath` archives provide the
    /// hierarchy for inherited members. Output entry timestamps are
    /// normalized, and `output` is replaced atomically.
    pub fn remap_archive(
        &self,
        input: &Path,
        output: &Path,
        mappings: &[PathBuf],
        classpath: &[PathBuf],
    ) -> Result<()> {
        let mut jar_mapping = JarMapping::new();
        for file in mappings {
            jar_mapping.load_mappings(file)?;
        }

        let mut inheritance = JointInheritance::new();
        for archive in std::iter::once(input).chain(classpath.iter().map(PathBuf::as_path)) {
            let hierarchy =
                ArchiveInheritance::from_archive(archive).map_err(|e| Error::remap(input, e))?;
            inheritance.add(Arc::new(hierarchy));
        }
        jar_mapping.set_fallback_inheritance(Arc::new(inheritance));

        let rewritten = temp_file_beside(output)?;
        self.engine
            .rewrite(&jar_mapping, input, rewritten.path())
            .map_err(|e| Error::remap(input, e))?;

        let normalized = temp_file_beside(output)?;
        normalize_timestamps(rewritten.path(), normalized.path())
            .map_err(|e| Error::remap(input, e))?;
        publish(normalized, output)?;
        Ok(())
    }

    /// `<stem>-<input sha256>-remapped-<provider>-<mapping hash>.jar`
    pub fn output_path(&self, version: &MappingVersion, input: &Path) -> Result<PathBuf> {
        let input_hash = sha256_file(input)?;
        let mapping_hash = self.manager.mapping_hash(version)?;
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        Ok(self.output_dir.join(format!(
            "{}-{}-remapped-{}-{}.jar",
            sanitize_filename(&stem),
            input_hash,
            sanitize_filename(&version.provider),
            mapping_hash
        )))
    }

    /// Remapped copy of `input` for `version`, reusing a cached output when
    /// one exists. With refresh enabled each output is rebuilt at most once
    /// per `Remapper`.
    pub fn remap(
        &self,
        version: &MappingVersion,
        input: &Path,
        classpath: &[PathBuf],
    ) -> Result<PathBuf> {
        let mapping_file = self.manager.mapping_file(version)?;
        let output = self.output_path(version, input)?;

        let lock = self.output_locks.entry(output.clone()).or_default().clone();
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let must_refresh = self.refresh && !self.refreshed.contains(&output);
        if output.is_file() && !must_refresh {
            debug!("Using cached remap {}", output.display());
            return Ok(output);
        }

        self.remap_archive(input, &output, &[mapping_file], classpath)?;
        if self.refresh {
            self.refreshed.insert(output.clone());
        }
        info!(
            "Remapped {} with {} into {}",
            input.display(),
            version,
            output.display()
        );
        Ok(output)
    }

    pub fn remap_bytes(
        &self,
        version: &MappingVersion,
        input: &Path,
        classpath: &[PathBuf],
    ) -> Result<Vec<u8>> {
        let output = self.remap(version, input, classpath)?;
        fs::read(&output).map_err(|e| Error::io(output, e))
    }
}
