use crate::{Entity, Relationship, RelationshipType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entities and relationships keyed by name, iterated in insertion order.
///
/// Re-inserting an existing key replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityGraph {
    entities: Vec<Entity>,
    entity_index: HashMap<String, usize>,
    relationships: Vec<(String, Relationship)>,
    relationship_index: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub entities: usize,
    pub fields: usize,
    pub relationships: usize,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_entity(&mut self, entity: Entity) {
        match self.entity_index.get(&entity.name) {
            Some(&idx) => self.entities[idx] = entity,
            None => {
                self.entity_index
                    .insert(entity.name.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entity_index.get(name).map(|&idx| &self.entities[idx])
    }

    pub fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entity_index
            .get(name)
            .map(|&idx| &mut self.entities[idx])
    }

    pub fn contains_entity(&self, name: &str) -> bool {
        self.entity_index.contains_key(name)
    }

    /// Entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.name.clone()).collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Record a relationship under `key`; a duplicate key overwrites the earlier edge.
    pub fn insert_relationship(&mut self, key: String, relationship: Relationship) {
        match self.relationship_index.get(&key) {
            Some(&idx) => self.relationships[idx].1 = relationship,
            None => {
                self.relationship_index
                    .insert(key.clone(), self.relationships.len());
                self.relationships.push((key, relationship));
            }
        }
    }

    pub fn relationship(&self, key: &str) -> Option<&Relationship> {
        self.relationship_index
            .get(key)
            .map(|&idx| &self.relationships[idx].1)
    }

    /// `(key, relationship)` pairs in declaration order.
    pub fn relationships(&self) -> impl Iterator<Item = (&str, &Relationship)> {
        self.relationships
            .iter()
            .map(|(key, rel)| (key.as_str(), rel))
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Linear scan for every relationship with `entity` at either end.
    pub fn relationships_of(&self, entity: &str) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .map(|(_, rel)| rel)
            .filter(|rel| rel.touches(entity))
            .collect()
    }

    /// Update adjacency sets for an edge between two known entities.
    ///
    /// One-to-many edges become parent/child links; every other kind is
    /// recorded symmetrically in `related`. Returns `false` when either
    /// endpoint is not a known entity.
    pub fn link(&mut self, from: &str, to: &str, kind: RelationshipType) -> bool {
        if !self.contains_entity(from) || !self.contains_entity(to) {
            return false;
        }
        if let Some(source) = self.entity_mut(from) {
            match kind {
                RelationshipType::OneToMany => source.relationships.children.insert(to.to_string()),
                _ => source.relationships.related.insert(to.to_string()),
            };
        }
        if let Some(target) = self.entity_mut(to) {
            match kind {
                RelationshipType::OneToMany => {
                    target.relationships.parents.insert(from.to_string())
                }
                _ => target.relationships.related.insert(from.to_string()),
            };
        }
        true
    }

    pub fn counts(&self) -> GraphCounts {
        GraphCounts {
            entities: self.entities.len(),
            fields: self.entities.iter().map(Entity::field_count).sum(),
            relationships: self.relationships.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_declaration_order_on_overwrite() {
        let mut graph = EntityGraph::new();
        graph.insert_entity(Entity::new("ACCOUNT"));
        graph.insert_entity(Entity::new("CONTACT"));
        graph.insert_entity(Entity::new("ACCOUNT"));
        assert_eq!(graph.entity_names(), vec!["ACCOUNT", "CONTACT"]);
    }

    #[test]
    fn link_updates_parent_child_for_one_to_many() {
        let mut graph = EntityGraph::new();
        graph.insert_entity(Entity::new("ACCOUNT"));
        graph.insert_entity(Entity::new("CONTACT"));
        assert!(graph.link("ACCOUNT", "CONTACT", RelationshipType::OneToMany));

        let account = graph.entity("ACCOUNT").unwrap();
        let contact = graph.entity("CONTACT").unwrap();
        assert!(account.relationships.children.contains("CONTACT"));
        assert!(contact.relationships.parents.contains("ACCOUNT"));
        assert!(account.relationships.related.is_empty());
    }

    #[test]
    fn link_ignores_unknown_endpoints() {
        let mut graph = EntityGraph::new();
        graph.insert_entity(Entity::new("ACCOUNT"));
        assert!(!graph.link("ACCOUNT", "GHOST", RelationshipType::ManyToMany));
        assert!(graph.entity("ACCOUNT").unwrap().relationships.related.is_empty());
    }

    #[test]
    fn duplicate_relationship_keys_overwrite() {
        let mut graph = EntityGraph::new();
        let key = Relationship::key_for("A", "B", None);
        graph.insert_relationship(
            key.clone(),
            Relationship::new("A", "B", None, RelationshipType::Related),
        );
        graph.insert_relationship(
            key.clone(),
            Relationship::new("A", "B", None, RelationshipType::OneToOne),
        );
        assert_eq!(graph.relationship_count(), 1);
        assert_eq!(
            graph.relationship(&key).map(|r| r.kind),
            Some(RelationshipType::OneToOne)
        );
    }
}
