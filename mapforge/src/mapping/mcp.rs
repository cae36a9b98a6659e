//! MCP mapping provider.
//!
//! Reads the obfuscated-to-SRG symbol table (`joined.srg`) and the SRG-to-MCP
//! name lookups (`fields.csv`, `methods.csv`) published on the Forge maven,
//! and composes them into any of the six supported directions.

use crate::dependency::{Coordinate, DependencyRequest};
use crate::error::{Error, Result};
use crate::mapping::entry::{EntryKind, MappingEntry};
use crate::mapping::provider::{MappingProvider, ResolvedDependencies};
use crate::mapping::srg;
use crate::mapping::table::{BiTable, MappingTable};
use crate::mapping::version::MappingVersion;
use crate::utils::SingleFlight;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub const MCP_PROVIDER: &str = "mcp";
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net/";

const SRG_HANDLE: &str = "srg";
const CSV_HANDLE: &str = "csv";

const JOINED_SRG: &str = "joined.srg";
const FIELDS_CSV: &str = "fields.csv";
const METHODS_CSV: &str = "methods.csv";

const SUPPORTED: &[&str] = &[
    "notch-srg",
    "notch-mcp",
    "srg-notch",
    "srg-mcp",
    "mcp-notch",
    "mcp-srg",
];

/// (target version, channel, version): everything the parsed data depends on.
type DataKey = (String, String, String);

pub struct McpMappingProvider {
    data: SingleFlight<DataKey, Arc<McpData>>,
    composed: SingleFlight<MappingVersion, Arc<MappingTable>>,
    parses: AtomicUsize,
}

impl McpMappingProvider {
    pub fn new() -> Self {
        Self {
            data: SingleFlight::new(),
            composed: SingleFlight::new(),
            parses: AtomicUsize::new(0),
        }
    }

    /// Number of times source files were actually parsed.
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    fn load(&self, version: &MappingVersion, deps: &ResolvedDependencies) -> Result<Arc<McpData>> {
        let key = (
            version.target_version.clone(),
            version.channel.clone(),
            version.version.clone(),
        );
        self.data.get_or_try_init(&key, || {
            let srg_source = deps.get(SRG_HANDLE)?;
            let csv_source = deps.get(CSV_HANDLE)?;
            let joined = read_member(srg_source, JOINED_SRG)?;
            let fields = read_lookup(&read_member(csv_source, FIELDS_CSV)?, FIELDS_CSV)?;
            let methods = read_lookup(&read_member(csv_source, METHODS_CSV)?, METHODS_CSV)?;

            let data = McpData::build(&joined, &fields, &methods)?;
            let parses = self.parses.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                "Parsed MCP {}_{} for {}: {} classes, {} fields, {} methods (parse #{})",
                version.channel,
                version.version,
                version.target_version,
                data.notch_srg_classes.len(),
                data.notch_srg_fields.len(),
                data.notch_srg_methods.len(),
                parses
            );
            Ok(Arc::new(data))
        })
    }
}

impl Default for McpMappingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingProvider for McpMappingProvider {
    fn name(&self) -> &str {
        MCP_PROVIDER
    }

    fn supported_directions(&self) -> &[&str] {
        SUPPORTED
    }

    fn repositories(&self) -> Vec<String> {
        vec![FORGE_MAVEN.to_string()]
    }

    fn dependencies(&self, version: &MappingVersion) -> Vec<(&'static str, DependencyRequest)> {
        vec![
            (
                SRG_HANDLE,
                Coordinate::new("de.oceanlabs.mcp", "mcp", version.target_version.as_str())
                    .with_classifier("srg")
                    .with_extension("zip")
                    .into(),
            ),
            (
                CSV_HANDLE,
                Coordinate::new(
                    "de.oceanlabs.mcp",
                    format!("mcp_{}", version.channel),
                    format!("{}-{}", version.version, version.target_version),
                )
                .with_extension("zip")
                .into(),
            ),
        ]
    }

    fn mapping(
        &self,
        version: &MappingVersion,
        dependencies: &ResolvedDependencies,
    ) -> Result<MappingTable> {
        if !self.supports(&version.direction) {
            return Err(Error::UnsupportedDirection {
                provider: MCP_PROVIDER.to_string(),
                direction: version.direction.clone(),
            });
        }
        let table = self.composed.get_or_try_init(version, || {
            let data = self.load(version, dependencies)?;
            debug!("Composing {}", version);
            data.compose(&version.direction).map(Arc::new)
        })?;
        Ok(table.as_ref().clone())
    }
}

#[derive(Debug, Default)]
struct McpData {
    notch_srg_packages: BiTable,
    notch_srg_classes: BiTable,
    notch_srg_fields: BiTable,
    notch_srg_methods: BiTable,
    srg_mcp_fields: BiTable,
    srg_mcp_methods: BiTable,
}

impl McpData {
    fn build(
        joined: &str,
        fields: &HashMap<String, String>,
        methods: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut data = McpData::default();
        for (idx, line) in joined.lines().enumerate() {
            let Some((notch, searge)) = srg::parse_record(line, idx + 1, JOINED_SRG)? else {
                continue;
            };
            let at_line = |e: Error| match e {
                Error::MappingSourceParse { message, .. } => {
                    Error::parse(JOINED_SRG, Some(idx + 1), message)
                }
                other => other,
            };
            match searge.kind() {
                EntryKind::Package => {
                    data.notch_srg_packages.insert(notch, searge).map_err(at_line)?
                }
                EntryKind::Class => {
                    data.notch_srg_classes.insert(notch, searge).map_err(at_line)?
                }
                EntryKind::Field => {
                    // names without a lookup row keep their SRG name
                    let friendly = friendly_name(fields, &searge);
                    data.srg_mcp_fields
                        .insert(searge.clone(), friendly)
                        .map_err(at_line)?;
                    data.notch_srg_fields.insert(notch, searge).map_err(at_line)?;
                }
                EntryKind::Method => {
                    let friendly = friendly_name(methods, &searge);
                    data.srg_mcp_methods
                        .insert(searge.clone(), friendly)
                        .map_err(at_line)?;
                    data.notch_srg_methods.insert(notch, searge).map_err(at_line)?;
                }
            }
        }
        Ok(data)
    }

    /// Classes and packages are never renamed between SRG and MCP; the
    /// SRG-side directions list every SRG class as its own identity.
    fn compose(&self, direction: &str) -> Result<MappingTable> {
        let mut table = MappingTable::new();
        match direction {
            "notch-srg" => {
                for bi in [
                    &self.notch_srg_packages,
                    &self.notch_srg_classes,
                    &self.notch_srg_fields,
                    &self.notch_srg_methods,
                ] {
                    insert_all(&mut table, bi.iter())?;
                }
            }
            "srg-notch" => {
                for bi in [
                    &self.notch_srg_packages,
                    &self.notch_srg_classes,
                    &self.notch_srg_fields,
                    &self.notch_srg_methods,
                ] {
                    insert_all(&mut table, bi.iter_inverse())?;
                }
            }
            "srg-mcp" => {
                insert_all(&mut table, self.class_placeholders())?;
                insert_all(&mut table, self.srg_mcp_fields.iter())?;
                insert_all(&mut table, self.srg_mcp_methods.iter())?;
            }
            "mcp-srg" => {
                insert_all(&mut table, self.class_placeholders())?;
                insert_all(&mut table, self.srg_mcp_fields.iter_inverse())?;
                insert_all(&mut table, self.srg_mcp_methods.iter_inverse())?;
            }
            "notch-mcp" => {
                insert_all(&mut table, self.notch_srg_packages.iter())?;
                insert_all(&mut table, self.notch_srg_classes.iter())?;
                for (notch, searge) in self.notch_srg_fields.iter() {
                    let friendly = self.srg_mcp_fields.get(searge).unwrap_or(searge);
                    table.insert(notch.clone(), friendly.clone())?;
                }
                for (notch, searge) in self.notch_srg_methods.iter() {
                    let friendly = self.srg_mcp_methods.get(searge).unwrap_or(searge);
                    table.insert(notch.clone(), friendly.clone())?;
                }
            }
            "mcp-notch" => {
                insert_all(&mut table, self.notch_srg_packages.iter_inverse())?;
                insert_all(&mut table, self.notch_srg_classes.iter_inverse())?;
                for (notch, searge) in self.notch_srg_fields.iter() {
                    let friendly = self.srg_mcp_fields.get(searge).unwrap_or(searge);
                    table.insert(friendly.clone(), notch.clone())?;
                }
                for (notch, searge) in self.notch_srg_methods.iter() {
                    let friendly = self.srg_mcp_methods.get(searge).unwrap_or(searge);
                    table.insert(friendly.clone(), notch.clone())?;
                }
            }
            other => {
                return Err(Error::UnsupportedDirection {
                    provider: MCP_PROVIDER.to_string(),
                    direction: other.to_string(),
                })
            }
        }
        Ok(table)
    }

    fn class_placeholders(&self) -> impl Iterator<Item = (&MappingEntry, &MappingEntry)> + '_ {
        self.notch_srg_classes.values().map(|class| (class, class))
    }
}

fn friendly_name(lookup: &HashMap<String, String>, searge: &MappingEntry) -> MappingEntry {
    match lookup.get(searge.name()) {
        Some(name) => searge.renamed(name.as_str()),
        None => searge.clone(),
    }
}

fn insert_all<'a>(
    table: &mut MappingTable,
    pairs: impl Iterator<Item = (&'a MappingEntry, &'a MappingEntry)>,
) -> Result<()> {
    for (from, to) in pairs {
        table.insert(from.clone(), to.clone())?;
    }
    Ok(())
}

/// Reads `member` from a zip archive, or from a directory holding the
/// extracted files. Archives may nest the member in a subdirectory.
fn read_member(source: &Path, member: &str) -> Result<String> {
    if source.is_dir() {
        let path = source.join(member);
        return fs::read_to_string(&path).map_err(|e| Error::io(path, e));
    }

    let file = File::open(source).map_err(|e| Error::io(source, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::Archive {
        path: source.to_path_buf(),
        message: e.to_string(),
    })?;
    let suffix = format!("/{}", member);
    let name = archive
        .file_names()
        .find(|n| *n == member || n.ends_with(&suffix))
        .map(str::to_string)
        .ok_or_else(|| Error::parse(source.display().to_string(), None, format!("missing {}", member)))?;

    let mut entry = archive.by_name(&name).map_err(|e| Error::Archive {
        path: source.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| Error::io(source, e))?;
    Ok(text)
}

/// `searge` -> `name` column lookup of an MCP CSV file.
fn read_lookup(text: &str, source_name: &str) -> Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| Error::parse(source_name, Some(1), e.to_string()))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| Error::parse(source_name, Some(1), format!("missing column '{}'", name)))
    };
    let (from_col, to_col) = (column("searge")?, column("name")?);

    let mut lookup = HashMap::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::parse(source_name, Some(idx + 2), e.to_string()))?;
        match (record.get(from_col), record.get(to_col)) {
            (Some(from), Some(to)) => {
                lookup.insert(from.to_string(), to.to_string());
            }
            _ => {
                return Err(Error::parse(
                    source_name,
                    Some(idx + 2),
                    "row is missing the searge or name column",
                ))
            }
        }
    }
    Ok(lookup)
}
