//! Provenance records, fabrication detection, and entity certificates.
//!
//! A [`ProvenanceStore`] is built once from a parsed, signed
//! [`EntityGraph`](erm_model::EntityGraph). It answers whether a claimed entity,
//! field, or relationship is backed by the authoritative model and issues
//! time-bounded certificates for entities that are.
//!
//! # Example
//!
//! ```
//! use erm_parse::parse_diagram;
//! use erm_prov::{ProvenanceStore, StoreConfig};
//! use erm_sign::{content_checksum, MasterSalt, SignatureEngine};
//!
//! let source = "erDiagram\nACCOUNT {\nint AccountID PK\n}\n";
//! let engine = SignatureEngine::new("erd.mmd", MasterSalt::from_raw("doc"));
//! let parsed = parse_diagram(source, &engine);
//! let store = ProvenanceStore::build(
//!     &parsed.graph,
//!     &engine,
//!     &content_checksum(source),
//!     StoreConfig::default(),
//! );
//!
//! let report = store.detect_fabricated_entities(["ACCOUNT", "pestType"]);
//! assert_eq!(report.fabricated[0].name, "pestType");
//! ```

mod certificate;
mod record;
mod stats;
mod store;

pub use certificate::{
    verify_certificate, CertificateBody, CertificateError, EntityCertificate,
    CERTIFICATE_VALIDITY_HOURS,
};
pub use record::{ProvenanceRecord, StoreMetadata};
pub use stats::{RejectedEntity, ValidationStats};
pub use store::{
    AuthenticEntity, FabricatedEntity, FabricationReport, FabricationSummary, ProvenanceStore,
    StoreConfig, StoreSummary, ValidatedEntity, ValidatedField, ValidatedRelationship,
    ValidationFailure,
};
