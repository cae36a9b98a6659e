//! Synthetic artifacts and the provider capability.

use crate::error::Result;
use crate::repo::identifier::ArtifactIdentifier;
use crate::utils::hash::sha1_hex;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub length: u64,
    /// Lowercase hex SHA-1 of the content.
    pub sha1: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ArtifactMetadata {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            length: bytes.len() as u64,
            sha1: sha1_hex(bytes),
            last_modified: None,
        }
    }
}

type Producer = Box<dyn Fn() -> Result<Vec<u8>> + Send + Sync>;

/// Bytes computed on first use. Metadata known up front is served without
/// producing the content.
pub struct SyntheticArtifact {
    producer: Producer,
    content: OnceCell<Arc<Vec<u8>>>,
    known: Option<ArtifactMetadata>,
    last_modified: Option<DateTime<Utc>>,
}

impl SyntheticArtifact {
    pub fn lazy<F>(producer: F) -> Self
    where
        F: Fn() -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            producer: Box::new(producer),
            content: OnceCell::new(),
            known: None,
            last_modified: None,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let content = Arc::new(bytes);
        let cell = OnceCell::new();
        let _ = cell.set(content.clone());
        Self {
            producer: Box::new(move || Ok(content.as_ref().clone())),
            content: cell,
            known: None,
            last_modified: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ArtifactMetadata) -> Self {
        self.known = Some(metadata);
        self
    }

    pub fn with_last_modified(mut self, time: DateTime<Utc>) -> Self {
        self.last_modified = Some(time);
        self
    }

    /// Content, produced at most once.
    pub fn bytes(&self) -> Result<Arc<Vec<u8>>> {
        self.content
            .get_or_try_init(|| (self.producer)().map(Arc::new))
            .cloned()
    }

    pub fn is_materialized(&self) -> bool {
        self.content.get().is_some()
    }

    pub fn metadata(&self) -> Result<ArtifactMetadata> {
        if let Some(known) = &self.known {
            return Ok(known.clone());
        }
        let mut metadata = ArtifactMetadata::of(&self.bytes()?);
        metadata.last_modified = self.last_modified;
        Ok(metadata)
    }
}

impl fmt::Debug for SyntheticArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticArtifact")
            .field("materialized", &self.is_materialized())
            .field("known", &self.known)
            .finish()
    }
}

/// Answer of an [`ArtifactProvider`]. `NotApplicable` is the normal "not
/// mine" response and lets the lookup fall through to the next provider.
#[derive(Debug)]
pub enum Provided {
    NotApplicable,
    Artifact(SyntheticArtifact),
}

impl Provided {
    pub fn is_applicable(&self) -> bool {
        matches!(self, Provided::Artifact(_))
    }

    pub fn into_artifact(self) -> Option<SyntheticArtifact> {
        match self {
            Provided::Artifact(a) => Some(a),
            Provided::NotApplicable => None,
        }
    }
}

pub trait ArtifactProvider: Send + Sync {
    fn name(&self) -> &str;

    fn provide(&self, identifier: &ArtifactIdentifier) -> Result<Provided>;
}
