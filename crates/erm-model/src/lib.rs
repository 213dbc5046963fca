//! In-memory entity-relationship model.
//!
//! The parser builds an [`EntityGraph`] once per load; every downstream
//! component (signatures, provenance records, gateway reads) consumes this
//! single canonical shape.

mod graph;

pub use graph::{EntityGraph, GraphCounts};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type Ident = String;

/// Column type of a [`Field`]. Unrecognized source types collapse to `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    #[default]
    String,
    Boolean,
    Decimal,
    Datetime,
    Date,
    Json,
}

impl FieldType {
    /// Map a source type token through the fixed, case-insensitive lookup table.
    pub fn from_source(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "int" => FieldType::Integer,
            "string" => FieldType::String,
            "bool" => FieldType::Boolean,
            "decimal" => FieldType::Decimal,
            "datetime" | "timestamp" => FieldType::Datetime,
            "date" => FieldType::Date,
            "jsonb" => FieldType::Json,
            _ => FieldType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Decimal => "decimal",
            FieldType::Datetime => "datetime",
            FieldType::Date => "date",
            FieldType::Json => "json",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key constraint token attached to a field line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyConstraint {
    #[serde(rename = "PK")]
    Primary,
    #[serde(rename = "FK")]
    Foreign,
}

impl KeyConstraint {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "PK" => Some(KeyConstraint::Primary),
            "FK" => Some(KeyConstraint::Foreign),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyConstraint::Primary => "PK",
            KeyConstraint::Foreign => "FK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: Ident,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub constraint: Option<KeyConstraint>,
    #[serde(default)]
    pub description: String,
    /// Set once the owning entity is sealed.
    pub signature: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<Ident>, ty: FieldType, constraint: Option<KeyConstraint>) -> Self {
        Self {
            name: name.into(),
            ty,
            constraint,
            description: String::new(),
            signature: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraint == Some(KeyConstraint::Primary)
    }

    pub fn is_foreign_key(&self) -> bool {
        self.constraint == Some(KeyConstraint::Foreign)
    }
}

/// Adjacency sets maintained by relationship lines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityRelations {
    pub parents: BTreeSet<Ident>,
    pub children: BTreeSet<Ident>,
    pub related: BTreeSet<Ident>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: Ident,
    /// Declaration order is preserved through `field_order`; lookups go through the map.
    fields: BTreeMap<Ident, Field>,
    field_order: Vec<Ident>,
    pub primary_key: Option<Ident>,
    pub foreign_keys: BTreeSet<Ident>,
    pub relationships: EntityRelations,
    pub signature: Option<String>,
}

impl Entity {
    pub fn new(name: impl Into<Ident>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
            field_order: Vec::new(),
            primary_key: None,
            foreign_keys: BTreeSet::new(),
            relationships: EntityRelations::default(),
            signature: None,
        }
    }

    /// Insert a field, replacing any earlier field with the same name.
    ///
    /// Key membership is updated from the field's constraint. A replaced field
    /// keeps its original declaration position.
    pub fn insert_field(&mut self, field: Field) {
        if let Some(previous) = self.fields.get(&field.name) {
            if previous.is_primary_key() && self.primary_key.as_deref() == Some(&field.name) {
                self.primary_key = None;
            }
            if previous.is_foreign_key() {
                self.foreign_keys.remove(&field.name);
            }
        } else {
            self.field_order.push(field.name.clone());
        }

        match field.constraint {
            Some(KeyConstraint::Primary) => self.primary_key = Some(field.name.clone()),
            Some(KeyConstraint::Foreign) => {
                self.foreign_keys.insert(field.name.clone());
            }
            None => {}
        }
        self.fields.insert(field.name.clone(), field);
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.field_order.iter().filter_map(|name| self.fields.get(name))
    }

    /// Field names in lexicographic order, independent of declaration order.
    pub fn sorted_field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_sealed(&self) -> bool {
        self.signature.is_some()
    }

    /// Derive field signatures and then the entity signature.
    ///
    /// Called once when the entity block closes; the signature is never
    /// recomputed afterwards.
    pub fn seal<S: Signer + ?Sized>(&mut self, signer: &S) {
        if self.is_sealed() {
            return;
        }
        let entity_name = self.name.clone();
        for field in self.fields.values_mut() {
            field.signature = Some(signer.field_signature(&entity_name, field));
        }
        self.signature = Some(signer.entity_signature(self));
    }
}

/// Cardinality classification derived from connector symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipType {
    OneToMany,
    ManyToOne,
    OneToOne,
    ManyToMany,
    Related,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::OneToMany => "one-to-many",
            RelationshipType::ManyToOne => "many-to-one",
            RelationshipType::OneToOne => "one-to-one",
            RelationshipType::ManyToMany => "many-to-many",
            RelationshipType::Related => "related",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: Ident,
    pub to: Ident,
    /// Label from the source line, or the lowercased target entity.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    pub signature: Option<String>,
}

impl Relationship {
    pub fn new(
        from: impl Into<Ident>,
        to: impl Into<Ident>,
        label: Option<&str>,
        kind: RelationshipType,
    ) -> Self {
        let to = to.into();
        let name = match label {
            Some(label) => label.to_string(),
            None => to.to_lowercase(),
        };
        Self {
            from: from.into(),
            to,
            name,
            kind,
            signature: None,
        }
    }

    /// Graph key for a relationship: `from-to-label`, with `default` for a missing label.
    pub fn key_for(from: &str, to: &str, label: Option<&str>) -> String {
        format!("{from}-{to}-{}", label.unwrap_or("default"))
    }

    pub fn touches(&self, entity: &str) -> bool {
        self.from == entity || self.to == entity
    }
}

/// Seam between the parser and the signature engine.
///
/// Implementations must be pure for a given salt: identical inputs always
/// produce identical signatures.
pub trait Signer {
    fn entity_signature(&self, entity: &Entity) -> String;
    fn field_signature(&self, entity_name: &str, field: &Field) -> String;
    fn relationship_signature(&self, relationship: &Relationship) -> String;
}
