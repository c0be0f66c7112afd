//! Tokens, as produced by the lexer.
use std::fmt::{self, Display};

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub value: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenKind, value: S, line: u32, column: u32) -> Self {
        Self {
            kind,
            value: value.into(),
            line,
            column,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.value == keyword
    }

    pub fn is_operator(&self, operator: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == operator
    }

    pub fn is_delimiter(&self, delimiter: &str) -> bool {
        self.kind == TokenKind::Delimiter && self.value == delimiter
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.value)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Keyword,
    Identifier,
    Operator,
    Delimiter,
    Integer,
    Float,
    String,
    Char,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Keyword => "KEYWORD",
            Self::Identifier => "IDENTIFIER",
            Self::Operator => "OPERATOR",
            Self::Delimiter => "DELIMITER",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::String => "STRING",
            Self::Char => "CHAR",
        };
        f.write_str(name)
    }
}

/// Reserved words of the language. Type names double as keywords so that a
/// declaration's leading token is recognizable without lookahead.
pub const KEYWORDS: &[&str] = &[
    "function", "int", "float", "bool", "string", "char", "void", "if", "else", "while", "print",
    "return", "true", "false",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}
