//! Synthetic maven artifacts: identifiers, providers and the repository
//! that chains them.

pub mod artifact;
pub mod identifier;
pub mod launcher;
pub mod mapping_repo;
pub mod pom;
pub mod remapping_repo;
pub mod repository;

pub use artifact::{ArtifactMetadata, ArtifactProvider, Provided, SyntheticArtifact};
pub use identifier::ArtifactIdentifier;
pub use launcher::LauncherArtifactProvider;
pub use mapping_repo::MappingArtifactProvider;
pub use pom::PomBuilder;
pub use remapping_repo::{RemapGroup, RemappingArtifactProvider};
pub use repository::SyntheticRepository;
