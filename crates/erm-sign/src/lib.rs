//! Salted SHA3-256 fingerprints for entities, fields, and relationships.
//!
//! Every signature is the hex digest of a canonical JSON body that includes the
//! source identifier and the per-load [`MasterSalt`]. Entity bodies list field
//! names and foreign keys in sorted order, so declaration order never changes
//! an entity signature.

use chrono::{DateTime, Utc};
use erm_model::{Entity, Field, Relationship, Signer};
use rand::RngCore;
use serde::Serialize;
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Hash algorithm used for every digest in a load.
pub const SIGNATURE_ALGORITHM: &str = "sha3-256";

/// Version of the signature body layout; mixed into the master salt.
pub const FORMAT_VERSION: &str = "1.0";

const SALT_NONCE_BYTES: usize = 16;

/// Hex SHA3-256 digest of raw file content.
pub fn content_checksum(content: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hex SHA3-256 digest of the compact JSON serialization of `value`.
///
/// Struct fields serialize in declaration order, which makes the output
/// canonical for the plain data types hashed in this workspace.
pub fn digest_json<T: Serialize + ?Sized>(value: &T) -> String {
    let json = serde_json::to_vec(value).expect("signature body serialization failed");
    let mut hasher = Sha3_256::new();
    hasher.update(&json);
    hex::encode(hasher.finalize())
}

/// Opaque per-load salt.
///
/// Derived once per load and shared by every signature in that load.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterSalt(String);

#[derive(Serialize)]
struct SaltSeed<'a> {
    source: &'a str,
    checksum: &'a str,
    loaded_at: &'a DateTime<Utc>,
    version: &'a str,
}

impl MasterSalt {
    /// Hash the load identity and append fresh random bytes.
    pub fn derive(source: &str, checksum: &str, loaded_at: DateTime<Utc>) -> Self {
        let seed = digest_json(&SaltSeed {
            source,
            checksum,
            loaded_at: &loaded_at,
            version: FORMAT_VERSION,
        });
        let mut nonce = [0u8; SALT_NONCE_BYTES];
        rand::rng().fill_bytes(&mut nonce);
        Self(format!("{seed}{}", hex::encode(nonce)))
    }

    /// Wrap a known salt value, e.g. to re-derive signatures for a past load.
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MasterSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "MasterSalt({prefix}..)")
    }
}

#[derive(Serialize)]
struct EntityBody<'a> {
    name: &'a str,
    fields: Vec<&'a str>,
    primary_key: Option<&'a str>,
    foreign_keys: Vec<&'a str>,
    source: &'a str,
    salt: &'a str,
}

#[derive(Serialize)]
struct FieldBody<'a> {
    entity: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    ty: &'a str,
    constraint: Option<&'a str>,
    is_primary_key: bool,
    is_foreign_key: bool,
    source: &'a str,
    salt: &'a str,
}

#[derive(Serialize)]
struct RelationshipBody<'a> {
    from: &'a str,
    to: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    source: &'a str,
    salt: &'a str,
}

/// Derives signatures for one load. Holds the source identifier and salt.
#[derive(Debug, Clone)]
pub struct SignatureEngine {
    source_id: String,
    salt: MasterSalt,
}

impl SignatureEngine {
    pub fn new(source_id: impl Into<String>, salt: MasterSalt) -> Self {
        Self {
            source_id: source_id.into(),
            salt,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn salt(&self) -> &MasterSalt {
        &self.salt
    }

    pub fn algorithm(&self) -> &'static str {
        SIGNATURE_ALGORITHM
    }

    pub fn entity_signature(&self, entity: &Entity) -> String {
        digest_json(&EntityBody {
            name: &entity.name,
            fields: entity.sorted_field_names(),
            primary_key: entity.primary_key.as_deref(),
            foreign_keys: entity.foreign_keys.iter().map(String::as_str).collect(),
            source: &self.source_id,
            salt: self.salt.as_str(),
        })
    }

    pub fn field_signature(&self, entity_name: &str, field: &Field) -> String {
        digest_json(&FieldBody {
            entity: entity_name,
            name: &field.name,
            ty: field.ty.as_str(),
            constraint: field.constraint.map(|c| c.as_str()),
            is_primary_key: field.is_primary_key(),
            is_foreign_key: field.is_foreign_key(),
            source: &self.source_id,
            salt: self.salt.as_str(),
        })
    }

    pub fn relationship_signature(&self, relationship: &Relationship) -> String {
        digest_json(&RelationshipBody {
            from: &relationship.from,
            to: &relationship.to,
            name: &relationship.name,
            kind: relationship.kind.as_str(),
            source: &self.source_id,
            salt: self.salt.as_str(),
        })
    }
}

impl Signer for SignatureEngine {
    fn entity_signature(&self, entity: &Entity) -> String {
        SignatureEngine::entity_signature(self, entity)
    }

    fn field_signature(&self, entity_name: &str, field: &Field) -> String {
        SignatureEngine::field_signature(self, entity_name, field)
    }

    fn relationship_signature(&self, relationship: &Relationship) -> String {
        SignatureEngine::relationship_signature(self, relationship)
    }
}
