//! Mapping data model, providers and the resolution engine.

pub mod entry;
pub mod manager;
pub mod mcp;
pub mod provider;
pub mod srg;
pub mod table;
pub mod version;

pub use entry::{EntryKind, MappingEntry};
pub use manager::MappingManager;
pub use mcp::McpMappingProvider;
pub use provider::{MappingProvider, ResolvedDependencies};
pub use table::{BiTable, MappingTable};
pub use version::{LazyMappingVersion, MappingVersion, MAPPING_EXTENSION};
