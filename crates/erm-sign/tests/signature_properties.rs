//! Determinism and order-independence properties of the signature engine.

use erm_model::{Entity, Field, FieldType, KeyConstraint};
use erm_parse::parse_diagram;
use erm_sign::{MasterSalt, SignatureEngine};
use proptest::prelude::*;

fn engine() -> SignatureEngine {
    SignatureEngine::new("erd.mmd", MasterSalt::from_raw("fixed-test-salt"))
}

fn entity_from(name: &str, fields: &[(String, Option<KeyConstraint>)]) -> Entity {
    let mut entity = Entity::new(name);
    for (field, constraint) in fields {
        entity.insert_field(Field::new(field.clone(), FieldType::String, *constraint));
    }
    entity
}

fn constraint_strategy() -> impl Strategy<Value = Option<KeyConstraint>> {
    prop_oneof![
        Just(None),
        Just(Some(KeyConstraint::Primary)),
        Just(Some(KeyConstraint::Foreign)),
    ]
}

proptest! {
    #[test]
    fn entity_signature_ignores_declaration_order(
        fields in prop::collection::btree_map("[a-z][a-z0-9_]{0,8}", constraint_strategy(), 1..8),
    ) {
        // At most one primary key keeps both orders describing the same entity.
        let mut seen_pk = false;
        let fields: Vec<(String, Option<KeyConstraint>)> = fields
            .into_iter()
            .map(|(name, c)| {
                let c = match c {
                    Some(KeyConstraint::Primary) if seen_pk => None,
                    Some(KeyConstraint::Primary) => {
                        seen_pk = true;
                        c
                    }
                    other => other,
                };
                (name, c)
            })
            .collect();
        let mut reversed = fields.clone();
        reversed.reverse();

        let engine = engine();
        let forward = entity_from("ACCOUNT", &fields);
        let backward = entity_from("ACCOUNT", &reversed);
        prop_assert_eq!(
            engine.entity_signature(&forward),
            engine.entity_signature(&backward)
        );
    }

    #[test]
    fn field_signature_is_pure(name in "[A-Za-z][A-Za-z0-9]{0,12}", c in constraint_strategy()) {
        let engine = engine();
        let field = Field::new(name, FieldType::Decimal, c);
        prop_assert_eq!(
            engine.field_signature("INVOICE", &field),
            engine.field_signature("INVOICE", &field)
        );
    }
}

#[test]
fn parsed_entities_with_reordered_fields_share_signatures() {
    let first = r#"
erDiagram
    CONTACT {
        int ContactID PK
        int AccountID FK
        string Email
    }
"#;
    let second = r#"
erDiagram
    CONTACT {
        string Email
        int AccountID FK
        int ContactID PK
    }
"#;
    let engine = engine();
    let a = parse_diagram(first, &engine);
    let b = parse_diagram(second, &engine);
    let sig_a = a.graph.entity("CONTACT").and_then(|e| e.signature.clone());
    let sig_b = b.graph.entity("CONTACT").and_then(|e| e.signature.clone());
    assert!(sig_a.is_some());
    assert_eq!(sig_a, sig_b);
}

#[test]
fn reparsing_with_the_same_salt_reproduces_every_signature() {
    let source = r#"
erDiagram
    ACCOUNT {
        int AccountID PK
    }
    CONTACT {
        int ContactID PK
        int AccountID FK
    }
    ACCOUNT ||--o{ CONTACT : "has"
"#;
    let engine = engine();
    let a = parse_diagram(source, &engine);
    let b = parse_diagram(source, &engine);
    assert_eq!(a.graph, b.graph);
}
