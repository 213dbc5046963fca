//! Authority gateway over the entity-relationship model.
//!
//! Collaborators construct an [`AuthorityGateway`], call
//! [`initialize`](AuthorityGateway::initialize) once, and then query entities
//! or check whether names they intend to use really come from the
//! authoritative diagram.
//!
//! ```no_run
//! use erm_authority::{AuthorityGateway, GatewayConfig};
//!
//! let gateway = AuthorityGateway::new(GatewayConfig::new("docs/erd.mmd"));
//! gateway.initialize()?;
//!
//! let report = gateway.detect_fabricated_entities(&["ACCOUNT", "pestType"])?;
//! for entity in &report.fabricated {
//!     eprintln!("{} is not part of the model: {}", entity.name, entity.reason);
//! }
//! # Ok::<(), erm_authority::AuthorityError>(())
//! ```

mod audit;
mod config;
mod error;
mod gateway;

pub use audit::{
    AccessEvent, AuditSink, InitializationFailedEvent, InitializedEvent, TracingAuditSink,
};
pub use config::{GatewayConfig, DEFAULT_ISSUER, DEFAULT_SOURCE_ID};
pub use error::{AuthorityError, AuthorityResult};
pub use gateway::{AuthorityGateway, GatewayState, HealthStatus, ProvenanceVerdict};

pub use erm_model::{Entity, Field, FieldType, KeyConstraint, Relationship, RelationshipType};
pub use erm_prov::{
    EntityCertificate, FabricatedEntity, FabricationReport, StoreSummary, ValidationStats,
};
