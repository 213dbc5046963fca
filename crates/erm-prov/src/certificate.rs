//! Tamper-evident entity certificates.

use crate::record::ProvenanceRecord;
use chrono::{DateTime, Utc};
use erm_sign::digest_json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validity window of an issued certificate.
pub const CERTIFICATE_VALIDITY_HOURS: i64 = 24;

/// Errors that can occur while verifying a certificate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertificateError {
    #[error("certificate hash mismatch: expected {expected}, found {found}")]
    HashMismatch { expected: String, found: String },

    #[error("certificate for '{entity}' expired at {expires_at}")]
    Expired {
        entity: String,
        expires_at: DateTime<Utc>,
    },

    #[error("certificate for '{entity}' is not valid before {issued_at}")]
    NotYetValid {
        entity: String,
        issued_at: DateTime<Utc>,
    },
}

/// Hashed part of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBody {
    pub issuer: String,
    pub entity: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub algorithm: String,
    pub source_checksum: String,
    /// Entity signature at issue time.
    pub signature: String,
    pub provenance: ProvenanceRecord,
}

impl CertificateBody {
    pub fn compute_hash(&self) -> String {
        digest_json(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCertificate {
    #[serde(flatten)]
    pub body: CertificateBody,
    pub certificate_hash: String,
}

impl EntityCertificate {
    pub(crate) fn seal(body: CertificateBody) -> Self {
        let certificate_hash = body.compute_hash();
        Self {
            body,
            certificate_hash,
        }
    }

    pub fn entity(&self) -> &str {
        &self.body.entity
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.body.expires_at
    }
}

/// Recompute the body hash and check the validity window at `now`.
pub fn verify_certificate(
    certificate: &EntityCertificate,
    now: DateTime<Utc>,
) -> Result<(), CertificateError> {
    let recomputed = certificate.body.compute_hash();
    if recomputed != certificate.certificate_hash {
        return Err(CertificateError::HashMismatch {
            expected: recomputed,
            found: certificate.certificate_hash.clone(),
        });
    }
    if now < certificate.body.issued_at {
        return Err(CertificateError::NotYetValid {
            entity: certificate.body.entity.clone(),
            issued_at: certificate.body.issued_at,
        });
    }
    if certificate.is_expired_at(now) {
        return Err(CertificateError::Expired {
            entity: certificate.body.entity.clone(),
            expires_at: certificate.body.expires_at,
        });
    }
    Ok(())
}
