// Mapforge Library
// Symbol mapping resolution, jar remapping and synthetic maven artifacts

pub mod config;
pub mod dependency;
pub mod environment;
pub mod error;
pub mod mapping;
pub mod remap;
pub mod repo;
pub mod utils;

pub use config::Config;
pub use environment::ForgeEnvironment;
pub use error::{BoxError, Error, Result};
pub use mapping::{MappingEntry, MappingManager, MappingProvider, MappingTable, MappingVersion};
pub use remap::Remapper;
pub use repo::{ArtifactIdentifier, Provided, SyntheticRepository};
