//! Provenance data structures.

use chrono::{DateTime, Utc};
use erm_model::{Entity, GraphCounts};
use serde::{Deserialize, Serialize};

/// Provenance of a single entity, derived from the graph at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub name: String,
    /// Identifier of the authoritative source file.
    pub source: String,
    pub field_count: usize,
    pub primary_key: Option<String>,
    pub foreign_keys: Vec<String>,
    /// Copy of the entity signature, kept independently of the signature map.
    pub signature: Option<String>,
    /// Whether the entity was sealed when the record was created.
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl ProvenanceRecord {
    pub fn from_entity(entity: &Entity, source: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            name: entity.name.clone(),
            source: source.to_string(),
            field_count: entity.field_count(),
            primary_key: entity.primary_key.clone(),
            foreign_keys: entity.foreign_keys.iter().cloned().collect(),
            signature: entity.signature.clone(),
            verified: entity.is_sealed(),
            created_at,
        }
    }
}

/// Store-wide metadata for one load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub source: String,
    pub checksum: String,
    pub algorithm: String,
    pub format_version: String,
    pub counts: GraphCounts,
    pub built_at: DateTime<Utc>,
}
