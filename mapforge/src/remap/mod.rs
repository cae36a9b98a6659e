//! Archive remapping: class file model, hierarchy lookups, the renaming
//! table, rewrite engines and the caching pipeline.

pub mod archive;
pub mod classfile;
pub mod engine;
pub mod inheritance;
pub mod jar_mapping;
pub mod remapper;

pub use engine::{ClassRemapEngine, RewriteEngine};
pub use inheritance::{ArchiveInheritance, InheritanceProvider, JointInheritance};
pub use jar_mapping::JarMapping;
pub use remapper::Remapper;
