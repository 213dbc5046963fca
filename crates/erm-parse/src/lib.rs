//! Line-oriented parser for the constrained entity-relationship diagram notation.
//!
//! ```text
//! erDiagram
//!     ACCOUNT {
//!         int AccountID PK "surrogate key"
//!         string Name
//!     }
//!     CONTACT {
//!         int ContactID PK
//!         int AccountID FK
//!     }
//!     ACCOUNT ||--o{ CONTACT : "has"
//! ```
//!
//! Every line is trimmed and classified independently. A small state machine
//! (`Outside` / `InsideEntity`) decides whether field lines are accepted.
//! Lines that match none of the detectors are skipped without error; deciding
//! whether an empty result is fatal belongs to the caller.

mod lex;

pub use lex::{lex_line, Token, TokenKind};

use erm_model::{
    Entity, EntityGraph, Field, FieldType, Ident, KeyConstraint, Relationship, RelationshipType,
    Signer,
};
use lex::unquote;
use tracing::debug;

/// Fixed declaration line that opens every diagram.
pub const DECLARATION_LINE: &str = "erDiagram";

const DIRECTION_PREFIX: &str = "direction";

/// The two connector bodies; any line containing one is a relationship candidate.
const CONNECTOR_BODIES: [&str; 2] = ["--", ".."];

/// Connector substring rules, checked in order. Symbol sets overlap, so the
/// order is part of the contract.
const CONNECTOR_RULES: [(&str, RelationshipType); 4] = [
    ("||--o{", RelationshipType::OneToMany),
    ("}|--||", RelationshipType::ManyToOne),
    ("||--||", RelationshipType::OneToOne),
    ("}|--o{", RelationshipType::ManyToMany),
];

/// Map connector symbols to a relationship type.
pub fn classify_connector(symbols: &str) -> RelationshipType {
    CONNECTOR_RULES
        .iter()
        .find(|(pattern, _)| symbols.contains(pattern))
        .map(|(_, kind)| *kind)
        .unwrap_or(RelationshipType::Related)
}

/// A parsed relationship line before it is recorded in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipLine {
    pub from: Ident,
    pub connector: String,
    pub to: Ident,
    pub label: Option<String>,
}

impl RelationshipLine {
    pub fn kind(&self) -> RelationshipType {
        classify_connector(&self.connector)
    }

    pub fn key(&self) -> String {
        Relationship::key_for(&self.from, &self.to, self.label.as_deref())
    }
}

/// Result of running the line detectors over one trimmed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Declaration,
    Direction,
    OpenEntity(Ident),
    CloseEntity,
    Field(Field),
    Relationship(RelationshipLine),
    /// Matched no detector.
    Skip,
}

/// Classify a trimmed, non-empty line.
///
/// Detectors run in a fixed order: entity block, field (only when
/// `inside_entity`), relationship.
pub fn classify_line(line: &str, inside_entity: bool) -> LineKind {
    if line == DECLARATION_LINE {
        return LineKind::Declaration;
    }
    if line.starts_with(DIRECTION_PREFIX) {
        return LineKind::Direction;
    }

    let has_connector = CONNECTOR_BODIES.iter().any(|body| line.contains(body));
    let tokens = lex_line(line);

    if !has_connector {
        if let Some(kind) = match_entity_block(line, &tokens) {
            return kind;
        }
    }
    if inside_entity {
        if let Some(field) = match_field(&tokens) {
            return LineKind::Field(field);
        }
    }
    if has_connector {
        if let Some(rel) = match_relationship(&tokens) {
            return LineKind::Relationship(rel);
        }
    }
    LineKind::Skip
}

fn match_entity_block(line: &str, tokens: &[Token]) -> Option<LineKind> {
    if line == "}" {
        return Some(LineKind::CloseEntity);
    }
    match tokens {
        [name, brace]
            if name.kind == TokenKind::Ident
                && brace.kind == TokenKind::LBrace
                && is_entity_name(&name.lexeme) =>
        {
            Some(LineKind::OpenEntity(name.lexeme.clone()))
        }
        _ => None,
    }
}

fn is_entity_name(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_')
}

fn match_field(tokens: &[Token]) -> Option<Field> {
    let (ty, name, rest) = match tokens {
        [ty, name, rest @ ..] if ty.kind == TokenKind::Ident && name.kind == TokenKind::Ident => {
            (ty, name, rest)
        }
        _ => return None,
    };

    // Key markers come before the description: `PK`, `FK`, `UK`, or a list such
    // as `PK, FK`. The first recognized key wins; other markers are ignored.
    let split = rest
        .iter()
        .position(|token| token.kind == TokenKind::String)
        .unwrap_or(rest.len());
    let (markers, tail) = rest.split_at(split);
    if markers
        .iter()
        .any(|token| !matches!(token.kind, TokenKind::Ident | TokenKind::Unknown))
    {
        return None;
    }
    let constraint = markers
        .iter()
        .filter(|token| token.kind == TokenKind::Ident)
        .find_map(|token| KeyConstraint::from_token(&token.lexeme));

    let description = match tail {
        [] => "",
        [desc] => unquote(&desc.lexeme),
        _ => return None,
    };

    Some(
        Field::new(name.lexeme.clone(), FieldType::from_source(&ty.lexeme), constraint)
            .with_description(description),
    )
}

fn match_relationship(tokens: &[Token]) -> Option<RelationshipLine> {
    let (from, connector, to, rest) = match tokens {
        [from, connector, to, rest @ ..]
            if from.kind == TokenKind::Ident
                && connector.kind == TokenKind::Connector
                && to.kind == TokenKind::Ident =>
        {
            (from, connector, to, rest)
        }
        _ => return None,
    };

    let label = match rest {
        [] => None,
        [colon, label]
            if colon.kind == TokenKind::Colon
                && matches!(label.kind, TokenKind::String | TokenKind::Ident) =>
        {
            Some(unquote(&label.lexeme).to_string())
        }
        _ => return None,
    };

    Some(RelationshipLine {
        from: from.lexeme.clone(),
        connector: connector.lexeme.clone(),
        to: to.lexeme.clone(),
        label,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseState {
    Outside,
    InsideEntity(Ident),
}

/// Output of [`parse_diagram`].
#[derive(Debug, Clone, Default)]
pub struct ParsedDiagram {
    pub graph: EntityGraph,
    /// Entities whose block was never closed; they carry no signature.
    pub unsealed: Vec<Ident>,
    pub skipped_lines: usize,
}

/// Parse diagram text into a signed entity graph.
///
/// Entities are sealed with `signer` when their closing `}` is read;
/// relationships are signed as they are recorded.
pub fn parse_diagram<S: Signer + ?Sized>(source: &str, signer: &S) -> ParsedDiagram {
    DiagramParser::new(signer).parse(source)
}

struct DiagramParser<'s, S: Signer + ?Sized> {
    signer: &'s S,
    state: ParseState,
    graph: EntityGraph,
    skipped_lines: usize,
}

impl<'s, S: Signer + ?Sized> DiagramParser<'s, S> {
    fn new(signer: &'s S) -> Self {
        Self {
            signer,
            state: ParseState::Outside,
            graph: EntityGraph::new(),
            skipped_lines: 0,
        }
    }

    fn parse(mut self, source: &str) -> ParsedDiagram {
        for (idx, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let inside = matches!(self.state, ParseState::InsideEntity(_));
            match classify_line(line, inside) {
                LineKind::Declaration | LineKind::Direction => {}
                LineKind::OpenEntity(name) => self.open_entity(name),
                LineKind::CloseEntity => self.close_entity(idx + 1),
                LineKind::Field(field) => self.add_field(field),
                LineKind::Relationship(rel) => self.add_relationship(rel),
                LineKind::Skip => {
                    debug!(line = idx + 1, text = line, "skipping unrecognized line");
                    self.skipped_lines += 1;
                }
            }
        }

        if let ParseState::InsideEntity(name) = &self.state {
            debug!(entity = %name, "input ended inside an entity block");
        }

        // A block reopened under the same name replaces the unclosed one, so
        // only the final graph knows which entities stayed unsealed.
        let unsealed = self
            .graph
            .entities()
            .filter(|entity| !entity.is_sealed())
            .map(|entity| entity.name.clone())
            .collect();

        ParsedDiagram {
            graph: self.graph,
            unsealed,
            skipped_lines: self.skipped_lines,
        }
    }

    fn open_entity(&mut self, name: Ident) {
        if let ParseState::InsideEntity(open) = &self.state {
            debug!(entity = %open, next = %name, "entity block left open");
        }
        self.graph.insert_entity(Entity::new(name.clone()));
        self.state = ParseState::InsideEntity(name);
    }

    fn close_entity(&mut self, line: usize) {
        match std::mem::replace(&mut self.state, ParseState::Outside) {
            ParseState::InsideEntity(name) => {
                if let Some(entity) = self.graph.entity_mut(&name) {
                    entity.seal(self.signer);
                }
            }
            ParseState::Outside => {
                debug!(line, "closing brace outside an entity block");
                self.skipped_lines += 1;
            }
        }
    }

    fn add_field(&mut self, field: Field) {
        if let ParseState::InsideEntity(name) = &self.state {
            if let Some(entity) = self.graph.entity_mut(name) {
                entity.insert_field(field);
            }
        }
    }

    fn add_relationship(&mut self, line: RelationshipLine) {
        let kind = line.kind();
        let key = line.key();
        let mut relationship = Relationship::new(
            line.from.clone(),
            line.to.clone(),
            line.label.as_deref(),
            kind,
        );
        relationship.signature = Some(self.signer.relationship_signature(&relationship));

        if !self.graph.link(&line.from, &line.to, kind) {
            debug!(
                from = %line.from,
                to = %line.to,
                "relationship endpoint not declared yet; adjacency not updated"
            );
        }
        self.graph.insert_relationship(key, relationship);
    }
}
