//! The authority gateway: one-time load plus read-only queries.

use crate::audit::{
    AccessEvent, AuditSink, InitializationFailedEvent, InitializedEvent, TracingAuditSink,
};
use crate::config::GatewayConfig;
use crate::error::{AuthorityError, AuthorityResult};
use chrono::{DateTime, Utc};
use erm_model::{Entity, EntityGraph, Field, Relationship};
use erm_parse::parse_diagram;
use erm_prov::{
    verify_certificate, EntityCertificate, FabricationReport, ProvenanceStore, StoreSummary,
    ValidationFailure, ValidationStats,
};
use erm_sign::{content_checksum, MasterSalt, SignatureEngine, SIGNATURE_ALGORITHM};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Lifecycle of a gateway. `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// Outcome of a provenance check, shaped for collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceVerdict {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ProvenanceVerdict {
    pub fn valid(signature: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: None,
            signature: Some(signature.into()),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            signature: None,
        }
    }
}

impl From<ValidationFailure> for ProvenanceVerdict {
    fn from(failure: ValidationFailure) -> Self {
        Self::invalid(failure.reason())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub state: GatewayState,
    pub initialized: bool,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub unsealed_entities: Vec<String>,
    pub checksum: String,
    pub algorithm: &'static str,
    pub loaded_at: DateTime<Utc>,
    pub uptime: Duration,
}

/// Everything produced by one successful load.
#[derive(Debug)]
struct LoadedModel {
    graph: EntityGraph,
    store: ProvenanceStore,
    unsealed: Vec<String>,
    checksum: String,
    loaded_at: DateTime<Utc>,
    started: Instant,
}

#[derive(Debug)]
enum Slot {
    Uninitialized,
    Initializing,
    Ready(Arc<LoadedModel>),
    Failed(String),
}

/// Single entry point for collaborators.
///
/// Construct one per load. [`AuthorityGateway::initialize`] reads and signs
/// the source file once; every other operation fails with
/// [`AuthorityError::NotInitialized`] until it has succeeded. After that the
/// gateway is read-only and can be shared across threads.
pub struct AuthorityGateway {
    config: GatewayConfig,
    audit: Arc<dyn AuditSink>,
    slot: RwLock<Slot>,
}

impl std::fmt::Debug for AuthorityGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityGateway")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl AuthorityGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            audit: Arc::new(TracingAuditSink),
            slot: RwLock::new(Slot::Uninitialized),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> GatewayState {
        match &*self.read_slot() {
            Slot::Uninitialized => GatewayState::Uninitialized,
            Slot::Initializing => GatewayState::Initializing,
            Slot::Ready(_) => GatewayState::Ready,
            Slot::Failed(_) => GatewayState::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == GatewayState::Ready
    }

    /// Load, parse, and sign the configured source file.
    ///
    /// A concurrent second call fails with `InitializationInProgress`; a call
    /// after success is a no-op; a call after failure reports the original
    /// failure. Retrying requires a new gateway.
    pub fn initialize(&self) -> AuthorityResult<()> {
        let Some(guard) = self.begin_initialize()? else {
            debug!("initialize called on a ready gateway");
            return Ok(());
        };

        let path = self.config.source_path.clone();
        info!(action = "initialize", path = %path.display(), "loading authoritative model");

        match self.load() {
            Ok(model) => {
                let event = InitializedEvent {
                    source_path: path.clone(),
                    checksum: model.checksum.clone(),
                    entity_count: model.graph.entity_count(),
                    relationship_count: model.graph.relationship_count(),
                    at: model.loaded_at,
                };
                info!(
                    action = "initialize",
                    path = %path.display(),
                    entities = event.entity_count,
                    relationships = event.relationship_count,
                    unsealed = model.unsealed.len(),
                    "authoritative model ready"
                );
                guard.finish(Slot::Ready(Arc::new(model)));
                self.audit.initialized(&event);
                Ok(())
            }
            Err(err) => {
                error!(
                    action = "initialize",
                    path = %path.display(),
                    error = %err,
                    "initialization failed"
                );
                guard.finish(Slot::Failed(err.to_string()));
                self.audit.initialization_failed(&InitializationFailedEvent {
                    source_path: path,
                    error: err.to_string(),
                    at: Utc::now(),
                });
                Err(err)
            }
        }
    }

    /// Move `Uninitialized` to `Initializing`. `None` means already ready.
    fn begin_initialize(&self) -> AuthorityResult<Option<InitializingGuard<'_>>> {
        let mut slot = self.write_slot();
        match &*slot {
            Slot::Uninitialized => {}
            Slot::Initializing => return Err(AuthorityError::InitializationInProgress),
            Slot::Ready(_) => return Ok(None),
            Slot::Failed(reason) => {
                return Err(AuthorityError::InitializationFailed {
                    reason: reason.clone(),
                })
            }
        }
        *slot = Slot::Initializing;
        Ok(Some(InitializingGuard {
            slot: &self.slot,
            finished: false,
        }))
    }

    fn load(&self) -> AuthorityResult<LoadedModel> {
        let path = &self.config.source_path;
        let metadata = fs::metadata(path)
            .map_err(|err| AuthorityError::source_unavailable(path, err.to_string()))?;
        if !metadata.is_file() {
            return Err(AuthorityError::source_unavailable(path, "not a regular file"));
        }
        let content = fs::read_to_string(path)
            .map_err(|err| AuthorityError::source_unavailable(path, err.to_string()))?;

        let checksum = content_checksum(&content);
        let loaded_at = Utc::now();
        let salt = MasterSalt::derive(&self.config.source_id, &checksum, loaded_at);
        let engine = SignatureEngine::new(self.config.source_id.clone(), salt);

        let parsed = parse_diagram(&content, &engine);
        if parsed.graph.entity_count() == 0 {
            return Err(AuthorityError::ParseIncomplete { path: path.clone() });
        }
        if !parsed.unsealed.is_empty() {
            warn!(entities = ?parsed.unsealed, "entity blocks left unclosed");
        }

        let store = ProvenanceStore::build(
            &parsed.graph,
            &engine,
            &checksum,
            self.config.store_config(),
        );

        Ok(LoadedModel {
            graph: parsed.graph,
            store,
            unsealed: parsed.unsealed,
            checksum,
            loaded_at,
            started: Instant::now(),
        })
    }

    /// Ready model or `NotInitialized`; emits the access event when auditing.
    fn ready(
        &self,
        operation: &'static str,
        params: serde_json::Value,
    ) -> AuthorityResult<Arc<LoadedModel>> {
        let model = match &*self.read_slot() {
            Slot::Ready(model) => Arc::clone(model),
            _ => return Err(AuthorityError::NotInitialized),
        };
        if self.config.audit_enabled {
            self.audit.access(&AccessEvent {
                operation,
                params,
                context: self.config.caller_context.clone(),
                at: Utc::now(),
            });
        }
        Ok(model)
    }

    pub fn get_entity(&self, name: &str) -> AuthorityResult<Option<Entity>> {
        let model = self.ready("get_entity", json!({ "name": name }))?;
        Ok(model.graph.entity(name).cloned())
    }

    /// Entity names in declaration order.
    pub fn get_all_entity_names(&self) -> AuthorityResult<Vec<String>> {
        let model = self.ready("get_all_entity_names", json!({}))?;
        Ok(model.graph.entity_names())
    }

    pub fn get_entity_field(&self, entity: &str, field: &str) -> AuthorityResult<Option<Field>> {
        let model = self.ready(
            "get_entity_field",
            json!({ "entity": entity, "field": field }),
        )?;
        Ok(model
            .graph
            .entity(entity)
            .and_then(|e| e.field(field))
            .cloned())
    }

    /// Relationships with `name` at either end; `None` when the entity is unknown.
    pub fn get_entity_relationships(
        &self,
        name: &str,
    ) -> AuthorityResult<Option<Vec<Relationship>>> {
        let model = self.ready("get_entity_relationships", json!({ "name": name }))?;
        if !model.graph.contains_entity(name) {
            return Ok(None);
        }
        Ok(Some(
            model
                .graph
                .relationships_of(name)
                .into_iter()
                .cloned()
                .collect(),
        ))
    }

    pub fn validate_entity_provenance(&self, name: &str) -> AuthorityResult<ProvenanceVerdict> {
        let model = self.ready("validate_entity_provenance", json!({ "name": name }))?;
        Ok(match model.store.validate_entity(name) {
            Ok(entity) => ProvenanceVerdict::valid(entity.signature),
            Err(failure) => failure.into(),
        })
    }

    pub fn validate_entity_field(
        &self,
        entity: &str,
        field: &str,
    ) -> AuthorityResult<ProvenanceVerdict> {
        let model = self.ready(
            "validate_entity_field",
            json!({ "entity": entity, "field": field }),
        )?;
        Ok(match model.store.validate_entity_field(entity, field) {
            Ok(field) => ProvenanceVerdict::valid(field.signature),
            Err(failure) => failure.into(),
        })
    }

    pub fn validate_relationship(
        &self,
        from: &str,
        to: &str,
        label: Option<&str>,
    ) -> AuthorityResult<ProvenanceVerdict> {
        let model = self.ready(
            "validate_relationship",
            json!({ "from": from, "to": to, "label": label }),
        )?;
        let key = Relationship::key_for(from, to, label);
        Ok(match model.store.validate_relationship(&key) {
            Ok(rel) => ProvenanceVerdict::valid(rel.signature),
            Err(failure) => failure.into(),
        })
    }

    pub fn detect_fabricated_entities<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> AuthorityResult<FabricationReport> {
        let listed: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        let model = self.ready("detect_fabricated_entities", json!({ "names": listed }))?;
        Ok(model.store.detect_fabricated_entities(listed))
    }

    pub fn generate_entity_certificate(
        &self,
        name: &str,
    ) -> AuthorityResult<Option<EntityCertificate>> {
        let model = self.ready("generate_entity_certificate", json!({ "name": name }))?;
        Ok(model.store.generate_entity_certificate(name))
    }

    /// Check a certificate's hash and window, and that it was issued by this load.
    pub fn verify_certificate(
        &self,
        certificate: &EntityCertificate,
    ) -> AuthorityResult<ProvenanceVerdict> {
        let model = self.ready(
            "verify_certificate",
            json!({ "entity": certificate.entity() }),
        )?;
        if let Err(err) = verify_certificate(certificate, Utc::now()) {
            return Ok(ProvenanceVerdict::invalid(err.to_string()));
        }
        let current = model
            .store
            .record(certificate.entity())
            .and_then(|record| record.signature.as_deref());
        if current != Some(certificate.body.signature.as_str()) {
            return Ok(ProvenanceVerdict::invalid(format!(
                "certificate for '{}' was not issued against the current model",
                certificate.entity()
            )));
        }
        Ok(ProvenanceVerdict::valid(certificate.certificate_hash.clone()))
    }

    pub fn get_health_status(&self) -> AuthorityResult<HealthStatus> {
        let model = self.ready("get_health_status", json!({}))?;
        Ok(HealthStatus {
            state: GatewayState::Ready,
            initialized: true,
            entity_count: model.graph.entity_count(),
            relationship_count: model.graph.relationship_count(),
            unsealed_entities: model.unsealed.clone(),
            checksum: model.checksum.clone(),
            algorithm: SIGNATURE_ALGORITHM,
            loaded_at: model.loaded_at,
            uptime: model.started.elapsed(),
        })
    }

    pub fn validation_stats(&self) -> AuthorityResult<ValidationStats> {
        let model = self.ready("validation_stats", json!({}))?;
        Ok(model.store.validation_stats())
    }

    pub fn summary(&self) -> AuthorityResult<StoreSummary> {
        let model = self.ready("summary", json!({}))?;
        Ok(model.store.summary())
    }

    pub fn loaded_at(&self) -> AuthorityResult<DateTime<Utc>> {
        let model = self.ready("loaded_at", json!({}))?;
        Ok(model.loaded_at)
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the slot in `Initializing`. Dropped without [`finish`] (a panic
/// during load), it leaves the gateway `Failed` instead of stuck.
///
/// [`finish`]: InitializingGuard::finish
struct InitializingGuard<'a> {
    slot: &'a RwLock<Slot>,
    finished: bool,
}

impl InitializingGuard<'_> {
    fn finish(mut self, outcome: Slot) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = outcome;
        self.finished = true;
    }
}

impl Drop for InitializingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.slot.write().unwrap_or_else(PoisonError::into_inner) =
                Slot::Failed("initialization aborted before completion".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_from_failure_carries_reason() {
        let verdict: ProvenanceVerdict = ValidationFailure::NotFound {
            name: "WORK_ORDER".into(),
        }
        .into();
        assert!(!verdict.valid);
        assert!(verdict.reason.unwrap().contains("not found"));
        assert!(verdict.signature.is_none());
    }

    #[test]
    fn verdict_serializes_without_empty_fields() {
        let json = serde_json::to_value(ProvenanceVerdict::valid("abc")).unwrap();
        assert_eq!(json, serde_json::json!({ "valid": true, "signature": "abc" }));
    }

    #[test]
    fn load_that_unwinds_leaves_gateway_failed() {
        let gateway = AuthorityGateway::new(GatewayConfig::new("missing.mmd"));
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = gateway.begin_initialize().unwrap().unwrap();
            assert_eq!(gateway.state(), GatewayState::Initializing);
            panic!("load aborted");
        }));
        assert!(outcome.is_err());
        assert_eq!(gateway.state(), GatewayState::Failed);
        match gateway.initialize() {
            Err(AuthorityError::InitializationFailed { reason }) => {
                assert!(reason.contains("aborted"));
            }
            other => panic!("expected InitializationFailed, got {other:?}"),
        }
    }

    #[test]
    fn new_gateway_is_uninitialized() {
        let gateway = AuthorityGateway::new(GatewayConfig::new("missing.mmd"));
        assert_eq!(gateway.state(), GatewayState::Uninitialized);
        assert!(matches!(
            gateway.get_all_entity_names(),
            Err(AuthorityError::NotInitialized)
        ));
    }
}
