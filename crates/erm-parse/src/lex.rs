use logos::Logos;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    /// Cardinality connector such as `||--o{` or `}|..|{`.
    Connector,
    String,
    LBrace,
    RBrace,
    Colon,
    Unknown,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r"[ \t\r]+", logos::skip)]
    Error,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[|}][|o](--|\.\.)[|o][|{]")]
    Connector,

    #[regex(r#""([^"\\]|\\.)*""#)]
    String,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
}

impl From<RawToken> for TokenKind {
    fn from(value: RawToken) -> Self {
        match value {
            RawToken::Ident => TokenKind::Ident,
            RawToken::Connector => TokenKind::Connector,
            RawToken::String => TokenKind::String,
            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Error => TokenKind::Unknown,
        }
    }
}

/// Tokenize a single trimmed diagram line.
pub fn lex_line(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(line);
    while let Some(raw) = lexer.next() {
        let raw = raw.unwrap_or(RawToken::Error);
        tokens.push(Token {
            kind: TokenKind::from(raw),
            lexeme: lexer.slice().to_string(),
        });
    }
    tokens
}

/// Strip the surrounding quotes from a string token.
pub(crate) fn unquote(lexeme: &str) -> &str {
    lexeme
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(lexeme)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<TokenKind> {
        lex_line(line).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_relationship_line() {
        let tokens = lex_line(r#"ACCOUNT ||--o{ CONTACT : "has""#);
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Ident,
                TokenKind::Connector,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::String
            ]
        );
        assert_eq!(tokens[1].lexeme, "||--o{");
    }

    #[test]
    fn closing_brace_connector_beats_rbrace() {
        assert_eq!(
            kinds("ORDER }|--|| CUSTOMER"),
            vec![TokenKind::Ident, TokenKind::Connector, TokenKind::Ident]
        );
        assert_eq!(kinds("}"), vec![TokenKind::RBrace]);
    }

    #[test]
    fn lexes_field_line_with_description() {
        assert_eq!(
            kinds(r#"int AccountID PK "surrogate key""#),
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::String
            ]
        );
    }

    #[test]
    fn unknown_characters_are_flagged() {
        assert!(kinds("varchar(255) name").contains(&TokenKind::Unknown));
    }

    #[test]
    fn unquote_strips_only_matching_quotes() {
        assert_eq!(unquote("\"has\""), "has");
        assert_eq!(unquote("has"), "has");
    }
}
