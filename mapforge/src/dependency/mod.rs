//! Dependency resolution: coordinates, the single-flight resolver and the
//! fetchers that back it.

pub mod coordinate;
pub mod fetch;
pub mod resolver;

pub use coordinate::{Coordinate, DependencyRequest};
pub use fetch::{HttpFetcher, MavenFetcher, UrlFetcher};
pub use resolver::{ArtifactFetcher, DependencyResolver, DEFAULT_CACHE_TTL};
