use erm_model::{FieldType, RelationshipType};
use erm_parse::parse_diagram;
use erm_sign::{MasterSalt, SignatureEngine};

fn engine() -> SignatureEngine {
    SignatureEngine::new("erd.mmd", MasterSalt::from_raw("parse-tests"))
}

const CRM: &str = r#"
erDiagram
    direction LR
    ACCOUNT {
        int AccountID PK "Primary key"
        string Name
        timestamp CreatedAt
        jsonb Settings
        uuid ExternalRef
    }
    CONTACT {
        int ContactID PK
        int AccountID FK
        bool Active
    }
    TAG {
        int TagID PK
    }
    ACCOUNT ||--o{ CONTACT : "has"
    CONTACT }|--o{ TAG : "tagged"
    this line is noise
"#;

#[test]
fn parses_entities_in_declaration_order() {
    let parsed = parse_diagram(CRM, &engine());
    assert_eq!(
        parsed.graph.entity_names(),
        vec!["ACCOUNT", "CONTACT", "TAG"]
    );
    assert!(parsed.unsealed.is_empty());
    assert_eq!(parsed.skipped_lines, 1);
}

#[test]
fn maps_field_types_and_keys() {
    let parsed = parse_diagram(CRM, &engine());
    let account = parsed.graph.entity("ACCOUNT").unwrap();
    assert_eq!(account.primary_key.as_deref(), Some("AccountID"));
    assert_eq!(account.field("CreatedAt").unwrap().ty, FieldType::Datetime);
    assert_eq!(account.field("Settings").unwrap().ty, FieldType::Json);
    assert_eq!(account.field("ExternalRef").unwrap().ty, FieldType::String);
    assert_eq!(account.field("AccountID").unwrap().description, "Primary key");

    let contact = parsed.graph.entity("CONTACT").unwrap();
    assert!(contact.foreign_keys.contains("AccountID"));
    assert_eq!(contact.field("Active").unwrap().ty, FieldType::Boolean);
}

#[test]
fn sealed_entities_carry_entity_and_field_signatures() {
    let parsed = parse_diagram(CRM, &engine());
    for entity in parsed.graph.entities() {
        assert!(entity.signature.is_some(), "{} is unsigned", entity.name);
        assert!(entity.fields().all(|f| f.signature.is_some()));
    }
    for (_, rel) in parsed.graph.relationships() {
        assert!(rel.signature.is_some());
    }
}

#[test]
fn one_to_many_updates_parent_and_child() {
    let parsed = parse_diagram(CRM, &engine());
    let account = parsed.graph.entity("ACCOUNT").unwrap();
    let contact = parsed.graph.entity("CONTACT").unwrap();
    assert!(account.relationships.children.contains("CONTACT"));
    assert!(contact.relationships.parents.contains("ACCOUNT"));

    let rel = parsed.graph.relationship("ACCOUNT-CONTACT-has").unwrap();
    assert_eq!(rel.kind, RelationshipType::OneToMany);
    assert_eq!(rel.name, "has");
}

#[test]
fn many_to_many_updates_related_symmetrically() {
    let parsed = parse_diagram(CRM, &engine());
    let contact = parsed.graph.entity("CONTACT").unwrap();
    let tag = parsed.graph.entity("TAG").unwrap();
    assert!(contact.relationships.related.contains("TAG"));
    assert!(tag.relationships.related.contains("CONTACT"));
    assert!(tag.relationships.parents.is_empty());

    let rel = parsed.graph.relationship("CONTACT-TAG-tagged").unwrap();
    assert_eq!(rel.kind, RelationshipType::ManyToMany);
}

#[test]
fn duplicate_field_names_keep_the_last_definition() {
    let source = r#"
erDiagram
    ORDER {
        int OrderID PK
        string Status
        int Status
    }
"#;
    let parsed = parse_diagram(source, &engine());
    let order = parsed.graph.entity("ORDER").unwrap();
    assert_eq!(order.field_count(), 2);
    assert_eq!(order.field("Status").unwrap().ty, FieldType::Integer);
}

#[test]
fn unclosed_entity_is_left_unsigned() {
    let source = r#"
erDiagram
    INVOICE {
        int InvoiceID PK
    LINE_ITEM {
        int LineItemID PK
    }
    PAYMENT {
        int PaymentID PK
"#;
    let parsed = parse_diagram(source, &engine());
    assert_eq!(parsed.unsealed, vec!["INVOICE", "PAYMENT"]);
    assert!(parsed.graph.entity("INVOICE").unwrap().signature.is_none());
    assert!(parsed.graph.entity("LINE_ITEM").unwrap().signature.is_some());
    assert!(parsed.graph.entity("PAYMENT").unwrap().signature.is_none());
}

#[test]
fn relationship_to_undeclared_entity_is_recorded_without_adjacency() {
    let source = r#"
erDiagram
    ACCOUNT {
        int AccountID PK
    }
    ACCOUNT ||--|| LEDGER : "books"
"#;
    let parsed = parse_diagram(source, &engine());
    let rel = parsed.graph.relationship("ACCOUNT-LEDGER-books").unwrap();
    assert_eq!(rel.kind, RelationshipType::OneToOne);
    assert!(parsed
        .graph
        .entity("ACCOUNT")
        .unwrap()
        .relationships
        .related
        .is_empty());
}

#[test]
fn empty_input_yields_empty_graph() {
    let parsed = parse_diagram("erDiagram\n\n", &engine());
    assert_eq!(parsed.graph.entity_count(), 0);
    assert_eq!(parsed.skipped_lines, 0);
}

#[test]
fn key_markers_beyond_pk_and_fk_keep_the_field() {
    let source = r#"
erDiagram
    CONTACT {
        int ContactID PK
        int AccountID FK, UK
        int OwnerID PK, FK
        string Email UK "login address"
    }
"#;
    let parsed = parse_diagram(source, &engine());
    let contact = parsed.graph.entity("CONTACT").unwrap();
    assert_eq!(
        contact.sorted_field_names(),
        vec!["AccountID", "ContactID", "Email", "OwnerID"]
    );
    assert!(contact.foreign_keys.contains("AccountID"));
    assert_eq!(contact.field("Email").unwrap().constraint, None);
    assert_eq!(contact.field("Email").unwrap().description, "login address");
    assert!(contact.field("Email").unwrap().signature.is_some());
    assert_eq!(parsed.skipped_lines, 0);
}

#[test]
fn reopened_block_that_closes_is_not_reported_unsealed() {
    let source = r#"
erDiagram
    ACCOUNT {
        int AccountID PK
    ACCOUNT {
        int OwnerID PK
    }
"#;
    let parsed = parse_diagram(source, &engine());
    let account = parsed.graph.entity("ACCOUNT").unwrap();
    assert!(account.is_sealed());
    assert!(account.field("AccountID").is_none());
    assert!(parsed.unsealed.is_empty());
}
