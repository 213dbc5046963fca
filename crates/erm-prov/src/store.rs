//! The provenance store and its validation operations.

use crate::certificate::{CertificateBody, EntityCertificate, CERTIFICATE_VALIDITY_HOURS};
use crate::record::{ProvenanceRecord, StoreMetadata};
use crate::stats::{ValidationLedger, ValidationStats};
use chrono::{DateTime, Duration, Utc};
use erm_model::EntityGraph;
use erm_sign::{SignatureEngine, FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a claimed entity, field, or relationship is not backed by the model.
///
/// The `Display` text doubles as the human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("entity '{name}' not found in authoritative model")]
    NotFound { name: String },

    #[error("entity '{name}' has no derived signature")]
    SignatureMissing { name: String },

    #[error("entity '{name}' signature does not match its provenance record")]
    SignatureMismatch { name: String },

    #[error("field '{entity}.{field}' not found in authoritative model")]
    FieldNotFound { entity: String, field: String },

    #[error("parent entity invalid: {source}")]
    ParentEntityInvalid {
        entity: String,
        source: Box<ValidationFailure>,
    },

    #[error("relationship '{key}' not found in authoritative model")]
    RelationshipNotFound { key: String },
}

impl ValidationFailure {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedEntity {
    pub name: String,
    pub signature: String,
    pub record: ProvenanceRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedField {
    pub entity: String,
    pub field: String,
    pub signature: String,
    pub entity_signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRelationship {
    pub key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticEntity {
    pub name: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricatedEntity {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricationSummary {
    pub total: usize,
    pub valid: usize,
    pub fabricated: usize,
}

/// Partition of claimed entity names into authentic and fabricated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricationReport {
    pub valid: Vec<AuthenticEntity>,
    pub fabricated: Vec<FabricatedEntity>,
    pub summary: FabricationSummary,
}

impl FabricationReport {
    pub fn has_fabrications(&self) -> bool {
        !self.fabricated.is_empty()
    }

    pub fn fabricated_names(&self) -> Vec<&str> {
        self.fabricated.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn valid_names(&self) -> Vec<&str> {
        self.valid.iter().map(|v| v.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Identity written into issued certificates.
    pub issuer: String,
    /// Maximum number of entries kept in the rejection log.
    pub rejected_log_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            issuer: "erm-authority".to_string(),
            rejected_log_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub metadata: StoreMetadata,
    pub records: usize,
    pub field_signatures: usize,
    pub relationship_signatures: usize,
    pub stats: ValidationStats,
}

/// Signed records for every entity of one load.
///
/// Records and signature maps are immutable after [`ProvenanceStore::build`];
/// only the validation counters change, behind a mutex, so the store can be
/// shared across readers.
#[derive(Debug)]
pub struct ProvenanceStore {
    metadata: StoreMetadata,
    issuer: String,
    records: HashMap<String, ProvenanceRecord>,
    entity_signatures: HashMap<String, String>,
    field_signatures: HashMap<String, String>,
    relationship_signatures: HashMap<String, String>,
    ledger: Mutex<ValidationLedger>,
}

impl ProvenanceStore {
    /// Build records and signature maps from a parsed graph.
    pub fn build(
        graph: &EntityGraph,
        engine: &SignatureEngine,
        checksum: &str,
        config: StoreConfig,
    ) -> Self {
        let built_at = Utc::now();
        let source = engine.source_id();

        let mut records = HashMap::new();
        let mut entity_signatures = HashMap::new();
        let mut field_signatures = HashMap::new();
        for entity in graph.entities() {
            records.insert(
                entity.name.clone(),
                ProvenanceRecord::from_entity(entity, source, built_at),
            );
            if let Some(signature) = &entity.signature {
                entity_signatures.insert(entity.name.clone(), signature.clone());
            }
            for field in entity.fields() {
                if let Some(signature) = &field.signature {
                    field_signatures.insert(
                        field_key(&entity.name, &field.name),
                        signature.clone(),
                    );
                }
            }
        }

        let relationship_signatures = graph
            .relationships()
            .filter_map(|(key, rel)| rel.signature.clone().map(|sig| (key.to_string(), sig)))
            .collect();

        let metadata = StoreMetadata {
            source: source.to_string(),
            checksum: checksum.to_string(),
            algorithm: engine.algorithm().to_string(),
            format_version: FORMAT_VERSION.to_string(),
            counts: graph.counts(),
            built_at,
        };

        debug!(
            source,
            entities = records.len(),
            signed = entity_signatures.len(),
            "provenance store built"
        );

        Self {
            metadata,
            issuer: config.issuer,
            records,
            entity_signatures,
            field_signatures,
            relationship_signatures,
            ledger: Mutex::new(ValidationLedger::new(config.rejected_log_capacity)),
        }
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    pub fn record(&self, name: &str) -> Option<&ProvenanceRecord> {
        self.records.get(name)
    }

    /// Check that `name` is a sealed entity of the authoritative model.
    ///
    /// Every call updates the validation counters; failures are also appended
    /// to the rejection log.
    pub fn validate_entity(&self, name: &str) -> Result<ValidatedEntity, ValidationFailure> {
        let outcome = self.check_entity(name);
        let mut ledger = self.ledger();
        match &outcome {
            Ok(_) => {
                ledger.record_success();
                debug!(entity = name, "entity provenance validated");
            }
            Err(failure) => {
                ledger.record_failure(name, failure.reason());
                warn!(entity = name, reason = %failure, "entity provenance rejected");
            }
        }
        outcome
    }

    fn check_entity(&self, name: &str) -> Result<ValidatedEntity, ValidationFailure> {
        let record = self
            .records
            .get(name)
            .ok_or_else(|| ValidationFailure::NotFound {
                name: name.to_string(),
            })?;
        let signature = self
            .entity_signatures
            .get(name)
            .ok_or_else(|| ValidationFailure::SignatureMissing {
                name: name.to_string(),
            })?;
        if record.signature.as_deref() != Some(signature.as_str()) {
            return Err(ValidationFailure::SignatureMismatch {
                name: name.to_string(),
            });
        }
        Ok(ValidatedEntity {
            name: name.to_string(),
            signature: signature.clone(),
            record: record.clone(),
        })
    }

    /// Validate the parent entity, then look up the field signature.
    pub fn validate_entity_field(
        &self,
        entity: &str,
        field: &str,
    ) -> Result<ValidatedField, ValidationFailure> {
        let parent =
            self.validate_entity(entity)
                .map_err(|failure| ValidationFailure::ParentEntityInvalid {
                    entity: entity.to_string(),
                    source: Box::new(failure),
                })?;
        let signature = self
            .field_signatures
            .get(&field_key(entity, field))
            .ok_or_else(|| ValidationFailure::FieldNotFound {
                entity: entity.to_string(),
                field: field.to_string(),
            })?;
        Ok(ValidatedField {
            entity: entity.to_string(),
            field: field.to_string(),
            signature: signature.clone(),
            entity_signature: parent.signature,
        })
    }

    /// Look up a relationship by its `from-to-label` key.
    pub fn validate_relationship(
        &self,
        key: &str,
    ) -> Result<ValidatedRelationship, ValidationFailure> {
        self.relationship_signatures
            .get(key)
            .map(|signature| ValidatedRelationship {
                key: key.to_string(),
                signature: signature.clone(),
            })
            .ok_or_else(|| ValidationFailure::RelationshipNotFound {
                key: key.to_string(),
            })
    }

    /// Validate every claimed name without aborting on failures.
    pub fn detect_fabricated_entities<I, S>(&self, names: I) -> FabricationReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut valid = Vec::new();
        let mut fabricated = Vec::new();
        for name in names {
            let name = name.as_ref();
            match self.validate_entity(name) {
                Ok(entity) => valid.push(AuthenticEntity {
                    name: entity.name,
                    signature: entity.signature,
                }),
                Err(failure) => fabricated.push(FabricatedEntity {
                    name: name.to_string(),
                    reason: failure.reason(),
                }),
            }
        }
        let summary = FabricationSummary {
            total: valid.len() + fabricated.len(),
            valid: valid.len(),
            fabricated: fabricated.len(),
        };
        if summary.fabricated > 0 {
            warn!(
                fabricated = summary.fabricated,
                total = summary.total,
                "fabricated entities detected"
            );
        }
        FabricationReport {
            valid,
            fabricated,
            summary,
        }
    }

    /// Issue a certificate valid for [`CERTIFICATE_VALIDITY_HOURS`] from now.
    pub fn generate_entity_certificate(&self, name: &str) -> Option<EntityCertificate> {
        self.generate_entity_certificate_at(name, Utc::now())
    }

    /// Issue a certificate as of `issued_at`. Invalid entities get none.
    pub fn generate_entity_certificate_at(
        &self,
        name: &str,
        issued_at: DateTime<Utc>,
    ) -> Option<EntityCertificate> {
        let validated = self.validate_entity(name).ok()?;
        let body = CertificateBody {
            issuer: self.issuer.clone(),
            entity: validated.name,
            issued_at,
            expires_at: issued_at + Duration::hours(CERTIFICATE_VALIDITY_HOURS),
            algorithm: self.metadata.algorithm.clone(),
            source_checksum: self.metadata.checksum.clone(),
            signature: validated.signature,
            provenance: validated.record,
        };
        Some(EntityCertificate::seal(body))
    }

    pub fn validation_stats(&self) -> ValidationStats {
        self.ledger().snapshot()
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            metadata: self.metadata.clone(),
            records: self.records.len(),
            field_signatures: self.field_signatures.len(),
            relationship_signatures: self.relationship_signatures.len(),
            stats: self.validation_stats(),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, ValidationLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn replace_entity_signature(&mut self, name: &str, signature: &str) {
        self.entity_signatures
            .insert(name.to_string(), signature.to_string());
    }
}

fn field_key(entity: &str, field: &str) -> String {
    format!("{entity}.{field}")
}
